pub mod admission_review;
mod api;
mod certs;
pub mod cli;
pub mod config;
pub mod mutation;
pub mod tracing;

use anyhow::Result;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::{
    handlers::{hello_handler, mutate_timezone_handler, readiness_handler},
    state::ApiServerState,
};
use crate::config::Config;
use crate::mutation::PatchGenerator;

pub struct WebhookServer {
    router: Router,
    addr: SocketAddr,
    tls_config: Option<RustlsConfig>,
    max_header_bytes: usize,
}

impl WebhookServer {
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let state = Arc::new(ApiServerState {
            patch_generator: PatchGenerator::new(config.verbose),
        });

        let tls_config = match config.tls_config {
            Some(tls_config) => {
                Some(certs::create_tls_config_and_watch_certificate_changes(tls_config).await?)
            }
            None => None,
        };

        let router = Router::new()
            .route("/mutateTimezone", post(mutate_timezone_handler))
            .route("/hello", get(hello_handler))
            .route("/readiness", get(readiness_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            router,
            addr: config.addr,
            tls_config,
            max_header_bytes: config.max_header_bytes,
        })
    }

    pub async fn run(self) -> Result<()> {
        match self.tls_config {
            None => {
                ::tracing::info!(address = %self.addr, "started HTTP server");
                let mut server = axum_server::bind(self.addr);
                server
                    .http_builder()
                    .http1()
                    .max_buf_size(self.max_header_bytes);
                server.serve(self.router.into_make_service()).await?;
            }
            Some(tls_config) => {
                ::tracing::info!(address = %self.addr, "started HTTPS server");
                let mut server = axum_server::bind_rustls(self.addr, tls_config);
                server
                    .http_builder()
                    .http1()
                    .max_buf_size(self.max_header_bytes);
                server.serve(self.router.into_make_service()).await?;
            }
        }

        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
