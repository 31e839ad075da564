use anyhow::{anyhow, Result};
use clap::ArgMatches;
use lazy_static::lazy_static;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub static SERVICE_NAME: &str = "timezone-webhook";

// hyper refuses HTTP/1 read buffers smaller than this
const MIN_HEADER_BYTES: usize = 8192;

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub tls_config: Option<TlsConfig>,
    pub verbose: bool,
    pub request_timeout: Duration,
    pub max_header_bytes: usize,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let addr = api_bind_address(matches)?;

        let (cert_file, key_file) = tls_files(matches)?;
        let tls_config = if cert_file.is_empty() {
            None
        } else {
            Some(TlsConfig {
                cert_file: PathBuf::from(cert_file),
                key_file: PathBuf::from(key_file),
            })
        };

        let verbose = matches
            .get_one::<bool>("verbose")
            .expect("clap should have set a default value")
            .to_owned();
        let request_timeout = Duration::from_secs(
            required_string(matches, "request-timeout")?
                .parse::<u64>()
                .map_err(|e| anyhow!("error parsing request-timeout: {}", e))?,
        );
        let max_header_bytes = required_string(matches, "max-header-bytes")?
            .parse::<usize>()
            .map_err(|e| anyhow!("error parsing max-header-bytes: {}", e))?;
        if max_header_bytes < MIN_HEADER_BYTES {
            return Err(anyhow!(
                "error parsing arguments: max-header-bytes must be at least {}",
                MIN_HEADER_BYTES
            ));
        }

        let log_level = required_string(matches, "log-level")?;
        let log_fmt = required_string(matches, "log-fmt")?;
        let log_no_color = matches
            .get_one::<bool>("log-no-color")
            .expect("clap should have assigned a default value")
            .to_owned();

        Ok(Self {
            addr,
            tls_config,
            verbose,
            request_timeout,
            max_header_bytes,
            log_level,
            log_fmt,
            log_no_color,
        })
    }
}

fn required_string(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .ok_or_else(|| anyhow!("error parsing arguments: {} is not set", id))
}

fn api_bind_address(matches: &ArgMatches) -> Result<SocketAddr> {
    format!(
        "{}:{}",
        required_string(matches, "address")?,
        required_string(matches, "port")?
    )
    .parse()
    .map_err(|e| anyhow!("error parsing arguments: {}", e))
}

fn tls_files(matches: &ArgMatches) -> Result<(String, String)> {
    let cert_file = required_string(matches, "cert-file")?;
    let key_file = required_string(matches, "key-file")?;
    if cert_file.is_empty() != key_file.is_empty() {
        Err(anyhow!("error parsing arguments: either both --cert-file and --key-file must be provided, or neither"))
    } else {
        Ok((cert_file, key_file))
    }
}
