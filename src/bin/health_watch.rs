// src/bin/health_watch.rs
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use jobapp_ops::{poller::StatusPoller, server::shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    jobapp_ops::init_tracing()?;

    let config = jobapp_ops::load_config_from_args().await?;
    let poller = Arc::new(StatusPoller::new(config.poller.clone(), None)?);

    let task = tokio::spawn(poller.clone().start());
    shutdown_signal().await;
    poller.shutdown();
    task.await?;

    let state = poller.snapshot();
    match &state.report {
        Some(report) => info!(
            "Last known status: {} at {}",
            report.overall_status, report.timestamp
        ),
        None => info!("No health report received"),
    }
    Ok(())
}
