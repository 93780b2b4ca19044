//! NWS Alert Bot
//!
//! Wires the NWS client, the webhook notifier, the reconciler and the poll
//! scheduler into one long-running process.

pub mod config;
pub mod zones;

pub use config::{BotConfig, ConfigError, LogFormat, SchedulerSettings};
pub use zones::{load_zones, parse_zones, ZoneError};

use anyhow::{anyhow, Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use nws_client::NwsClient;
use poll_scheduler::{PollScheduler, PollState};
use reconciler::Reconciler;
use std::future::Future;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webhook_notifier::WebhookNotifier;

/// Initialize logging; `RUST_LOG` overrides the default `info` level
pub fn init_logging(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Install the Prometheus listener
pub fn init_metrics(addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid metrics address {}", addr))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Serving metrics on {}", addr);
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Flip `shutdown` once `signal` fires.
///
/// If no handler could be installed the sender is held forever, so the
/// scheduler keeps polling instead of seeing a closed channel.
pub async fn forward_shutdown<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown requested, finishing current tick");
            let _ = shutdown.send(true);
        }
        Err(e) => {
            warn!("Failed to install signal handlers, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Run the bot until Ctrl-C or SIGTERM
pub async fn run(config: BotConfig) -> Result<()> {
    let zones = load_zones(&config.zones_file)
        .with_context(|| format!("Failed to load zones from {}", config.zones_file.display()))?;

    if let Some(addr) = &config.metrics_addr {
        init_metrics(addr)?;
    }

    let source = NwsClient::new(&config.nws_base_url, &config.user_agent)
        .context("Failed to create NWS client")?;
    let notifier = WebhookNotifier::new(&config.webhook_config())
        .context("Failed to create webhook notifier")?;
    let reconciler = Reconciler::new(source, notifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown(wait_for_signal(), shutdown_tx));

    let scheduler = PollScheduler::new(config.scheduler_config());
    let mut state = PollState::new();
    scheduler
        .run(&reconciler, &mut state, &zones, shutdown_rx)
        .await;

    info!(
        "Exiting with {} tracked alerts after {} ticks",
        state.registry.len(),
        state.ticks
    );
    Ok(())
}
