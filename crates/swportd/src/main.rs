//! swportd - Switch-Stack Port Management Daemon
//!
//! Entry point: loads settings and inventory, warms the interface cache and
//! keeps it fresh until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use swport_netconf::NetconfClient;
use swportd::config_file::DEFAULT_CONFIG_PATH;
use swportd::{Inventory, MemoryStore, PortdConfig, Services};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "swportd", version, about = "Switch-stack port management daemon")]
struct Cli {
    /// Settings file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Skip the startup refresh of every device
    #[arg(long)]
    no_warm: bool,

    /// JSON device file, replaces the [devices] table
    #[arg(long)]
    devices_json: Option<PathBuf>,
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set logger")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!("swportd: Starting");

    let config = PortdConfig::load_or_default(&cli.config)?;
    config.validate()?;

    let inventory = match &cli.devices_json {
        Some(path) => Inventory::load_json(path, &config.netconf)?,
        None => Inventory::from_config(&config)?,
    };
    if inventory.is_empty() {
        warn!("swportd: No devices configured");
    }
    info!(devices = inventory.len(), "swportd: Inventory loaded");

    let services = Services::new(
        inventory,
        Arc::new(MemoryStore::new()),
        NetconfClient::ssh(config.commit_options()),
        config.cache.ttls(),
    );

    let sync = services.sync_service(config.sync_interval());
    if config.sync.warm_on_start && !cli.no_warm {
        sync.warm().await;
    }

    let token = CancellationToken::new();
    let tasks = sync.spawn(token.clone());
    info!(
        interval_secs = config.sync.interval_secs,
        "swportd: Refresh loops running"
    );

    wait_for_shutdown().await;
    info!("swportd: Received shutdown signal");
    token.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "swportd: Refresh task ended abnormally");
        }
    }

    info!("swportd: Graceful shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};
    match unix_signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "swportd: SIGTERM handler unavailable");
            let _ = signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = signal::ctrl_c().await;
}
