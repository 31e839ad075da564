use axum::Router;
use std::{net::SocketAddr, time::Duration};
use timezone_webhook::{config::Config, WebhookServer};

pub(crate) fn default_test_config() -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        tls_config: None,
        verbose: true,
        request_timeout: Duration::from_secs(10),
        max_header_bytes: 1 << 20,
        log_level: "info".to_owned(),
        log_fmt: "json".to_owned(),
        log_no_color: false,
    }
}

pub(crate) async fn app(config: Config) -> Router {
    let server = WebhookServer::new_from_config(config).await.unwrap();

    server.router()
}
