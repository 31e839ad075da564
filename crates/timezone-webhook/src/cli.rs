use clap::builder::PossibleValue;
use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    let mut args = vec![
        Arg::new("log-level")
            .long("log-level")
            .value_name("LOG_LEVEL")
            .env("TIMEZONE_WEBHOOK_LOG_LEVEL")
            .default_value("info")
            .value_parser([
                PossibleValue::new("trace"),
                PossibleValue::new("debug"),
                PossibleValue::new("info"),
                PossibleValue::new("warn"),
                PossibleValue::new("error"),
            ])
            .help("Log level"),
        Arg::new("log-fmt")
            .long("log-fmt")
            .value_name("LOG_FMT")
            .env("TIMEZONE_WEBHOOK_LOG_FMT")
            .default_value("text")
            .value_parser([PossibleValue::new("text"), PossibleValue::new("json")])
            .help("Log output format"),
        Arg::new("log-no-color")
            .long("log-no-color")
            .env("NO_COLOR")
            .action(ArgAction::SetTrue)
            .help("Disable colored output for logs"),
        Arg::new("address")
            .long("addr")
            .value_name("BIND_ADDRESS")
            .default_value("0.0.0.0")
            .env("TIMEZONE_WEBHOOK_BIND_ADDRESS")
            .help("Bind against ADDRESS"),
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .default_value("443")
            .env("TIMEZONE_WEBHOOK_PORT")
            .help("Listen on PORT"),
        Arg::new("cert-file")
            .long("cert-file")
            .value_name("CERT_FILE")
            .default_value("/certs/cert.pem")
            .env("TIMEZONE_WEBHOOK_CERT_FILE")
            .help("Path to an X.509 certificate file for HTTPS, empty to serve plain HTTP"),
        Arg::new("key-file")
            .long("key-file")
            .value_name("KEY_FILE")
            .default_value("/certs/key.pem")
            .env("TIMEZONE_WEBHOOK_KEY_FILE")
            .help("Path to the X.509 private key matching CERT_FILE, empty to serve plain HTTP"),
        Arg::new("verbose")
            .long("verbose")
            .env("TIMEZONE_WEBHOOK_VERBOSE")
            .action(ArgAction::SetTrue)
            .help("Log every AdmissionReview sent back to the API server"),
        Arg::new("request-timeout")
            .long("request-timeout")
            .value_name("SECONDS")
            .default_value("10")
            .env("TIMEZONE_WEBHOOK_REQUEST_TIMEOUT")
            .help("Abort requests taking longer than SECONDS"),
        Arg::new("max-header-bytes")
            .long("max-header-bytes")
            .value_name("BYTES")
            .default_value("1048576")
            .env("TIMEZONE_WEBHOOK_MAX_HEADER_BYTES")
            .help("Maximum size of the request headers"),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .args(args)
}
