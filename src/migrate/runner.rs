// src/migrate/runner.rs
use super::files::{file_name, pending_migrations, rollback_migration};
use super::MigrateError;
use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use std::path::Path;
use tracing::{error, info, warn};

/// Runs one SQL script, possibly holding several statements.
#[async_trait]
pub trait ScriptExecutor: Send {
    async fn execute_script(&mut self, sql: &str) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl ScriptExecutor for PgConnection {
    async fn execute_script(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::Executor::execute(&mut *self, sqlx::raw_sql(sql)).await?;
        Ok(())
    }
}

pub async fn connect(database_url: &str) -> Result<PgConnection, MigrateError> {
    info!("Connecting to database...");
    let conn = PgConnection::connect(database_url).await?;
    info!("Connected to database");
    Ok(conn)
}

/// Applies migration files in order, stopping at the first failure.
pub struct MigrationRunner<E> {
    executor: E,
}

impl<E: ScriptExecutor> MigrationRunner<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Apply every pending migration in `dir`. Returns the applied file names.
    pub async fn apply_all(&mut self, dir: &Path) -> Result<Vec<String>, MigrateError> {
        let files = pending_migrations(dir).await?;
        if files.is_empty() {
            warn!("No migration files found in {}", dir.display());
            return Ok(Vec::new());
        }

        info!("Found {} migration(s)", files.len());

        let mut applied = Vec::with_capacity(files.len());
        for path in files {
            let name = file_name(&path).to_string();
            self.apply_file(&path, &name).await?;
            applied.push(name);
        }

        info!("All migrations completed successfully");
        Ok(applied)
    }

    /// Apply the `.down.sql` file for migration `number`. Returns its file name.
    pub async fn rollback(&mut self, dir: &Path, number: &str) -> Result<String, MigrateError> {
        let path = rollback_migration(dir, number).await?;
        let name = file_name(&path).to_string();

        info!("Rolling back migration: {}", name);
        self.apply_file(&path, &name).await?;
        Ok(name)
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    async fn apply_file(&mut self, path: &Path, name: &str) -> Result<(), MigrateError> {
        let sql = tokio::fs::read_to_string(path).await?;

        info!(file = %name, "Running migration");
        match self.executor.execute_script(&sql).await {
            Ok(()) => {
                info!(file = %name, "Applied successfully");
                Ok(())
            }
            Err(source) => {
                error!(file = %name, "Migration failed: {}", source);
                Err(MigrateError::Failed {
                    file: name.to_string(),
                    source,
                })
            }
        }
    }
}
