use anyhow::{anyhow, Result};
use tracing::{error, info};

use timezone_webhook::{
    cli,
    config::{self, Config},
    tracing::setup_tracing,
    WebhookServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let config = Config::from_args(&matches)?;

    setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color)?;

    // Both the ring and the aws-lc-rs providers end up being compiled in,
    // rustls needs to be told which one to use.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Cannot install the rustls crypto provider"))?;

    info!(service = config::SERVICE_NAME, "starting webhook server");

    let server = WebhookServer::new_from_config(config).await?;
    if let Err(e) = server.run().await {
        error!(error = %e, "webhook server terminated");
        return Err(e);
    }

    info!("server shutdown");
    Ok(())
}
