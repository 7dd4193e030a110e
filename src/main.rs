// src/main.rs
use anyhow::{Context, Result};
use hyper::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use jobapp_ops::{
    health::Prober,
    metrics::{start_metrics_server, MetricsRegistry},
    server::{shutdown_signal, HealthHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    jobapp_ops::init_tracing()?;

    let config = jobapp_ops::load_config_from_args().await?;

    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    let prober = Prober::new(config.gateway.clone(), Some(metrics.clone()))
        .context("Failed to resolve gateway endpoints")?;
    info!(
        "Probing gateway at {} ({:?}, {:?})",
        prober.base_url(),
        config.gateway.environment,
        config.gateway.deployment
    );

    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, metrics_registry, config.metrics.path.clone()).await?;
    }

    let mut handler = HealthHandler::new(Arc::new(prober)).with_metrics(metrics);
    if let Some(code) = config.server.down_status_code {
        handler = handler.with_down_status(StatusCode::from_u16(code)?);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Starting health endpoint on {}", addr);

    ServerBuilder::new(addr)
        .with_handler(handler)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
