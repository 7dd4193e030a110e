// src/bin/migrate.rs
//! Usage:
//!   migrate                 apply every pending migration, in file-name order
//!   migrate down [NUMBER]   apply NUMBER_*.down.sql (default 001)
//!
//! Set `JOBAPP_CONFIG` to load a config file; otherwise defaults and environment apply.
use anyhow::Result;
use sqlx::Connection;
use std::path::Path;
use tracing::info;

use jobapp_ops::migrate::{connect, MigrateError, MigrationRunner};

#[tokio::main]
async fn main() -> Result<()> {
    jobapp_ops::init_tracing()?;

    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match std::env::var("JOBAPP_CONFIG") {
        Ok(path) => jobapp_ops::config::load_config(path).await?,
        Err(_) => jobapp_ops::config::from_env()?,
    };
    let database_url = config
        .migrate
        .database_url
        .as_deref()
        .ok_or(MigrateError::MissingDatabaseUrl)?;
    let dir = Path::new(&config.migrate.migrations_dir);

    let mut runner = MigrationRunner::new(connect(database_url).await?);
    let outcome = match args.first().map(String::as_str) {
        Some("down") => {
            let number = args.get(1).map(String::as_str).unwrap_or("001");
            runner
                .rollback(dir, number)
                .await
                .map(|file| info!("Rollback {} completed successfully", file))
        }
        _ => runner.apply_all(dir).await.map(|_| ()),
    };

    runner.into_inner().close().await?;
    Ok(outcome?)
}
