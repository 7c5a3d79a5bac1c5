//! SensorWatch Agent - per-host hardware telemetry agent
//!
//! This agent pushes periodic readings to the SensorWatch kernel:
//! - CPU / GPU temperature and memory usage probes
//! - HTTP delivery with a fixed retry budget and fixed retry delay
//! - Clean shutdown on Ctrl-C between cycles, attempts and waits

mod clock;
mod collection;
mod config;
mod delivery;
mod discovery;
mod reading;
mod sensors;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::clock::TokioClock;
use crate::collection::CollectionLoop;
use crate::config::AgentConfig;
use crate::delivery::{DeliveryClient, HttpTransport};
use crate::discovery::SystemInfo;
use crate::sensors::SensorSuite;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🌡️ SensorWatch Agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load().await.context("Failed to load agent configuration")?;
    let system_info = SystemInfo::discover().context("Failed to identify this host")?;

    info!("Sending data to: {}", config.server_url);
    info!("Collection interval: {}s", config.collection_interval_secs);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping agent");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // dropping the sender would read as a shutdown request
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    let transport = HttpTransport::new(
        config.server_url.clone(),
        config.api_key.clone(),
        config.retry_policy().attempt_timeout,
    )?;
    let client = DeliveryClient::new(transport, TokioClock, config.retry_policy())
        .with_shutdown(shutdown_rx.clone());

    let collection = CollectionLoop::new(
        system_info,
        SensorSuite::detect(),
        client,
        config.collection_interval(),
    );
    collection.run(shutdown_rx).await;

    info!("Agent stopped");
    Ok(())
}
