//! NWS Alert Bot - Main Entry Point

use alert_bot::{init_logging, run, BotConfig};
use anyhow::{Context, Result};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = BotConfig::load().context("Invalid configuration")?;
    init_logging(config.log_format)?;

    info!("=== NWS Alert Bot v{} ===", env!("CARGO_PKG_VERSION"));
    run(config).await
}
