// src/lib.rs
pub mod config;
pub mod deploy;
pub mod health;
pub mod metrics;
pub mod migrate;
pub mod poller;
pub mod server;

/// Install the fmt subscriber with `RUST_LOG` plus crate defaults.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jobapp_ops=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();
    Ok(())
}

/// Config from the path in the first CLI argument, or defaults plus environment.
pub async fn load_config_from_args() -> anyhow::Result<config::Config> {
    match std::env::args().nth(1).filter(|arg| !arg.starts_with("--")) {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(&path).await
        }
        None => {
            tracing::info!("No config file given, using defaults and environment");
            config::from_env()
        }
    }
}
