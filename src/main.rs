//! WRowFusion - WaterRower S4 bridge daemon
//!
//! Main entry point for the daemon.

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wrowfusion::{Config, WRowFusion};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting WRowFusion v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("failed to load configuration")?;
    let app = WRowFusion::start(config);

    let shutdown = app.shutdown_handle();
    ctrlc::set_handler({
        let shutdown = shutdown.clone();
        move || {
            tracing::info!("interrupt received; stopping");
            shutdown.trigger();
        }
    })
    .context("failed to install signal handler")?;

    // Park until the stop flag trips, then bring everything down.
    while !shutdown.wait(Duration::from_secs(1)) {}
    app.join();

    tracing::info!("WRowFusion stopped");
    Ok(())
}
