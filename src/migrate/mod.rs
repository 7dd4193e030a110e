// src/migrate/mod.rs
mod files;
mod runner;

pub use files::{pending_migrations, rollback_migration, DOWN_SUFFIX};
pub use runner::{connect, MigrationRunner, ScriptExecutor};

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,

    #[error("Migrations directory not found: {0}")]
    MigrationsDirMissing(String),

    #[error("No rollback file found for migration {0} (expected {0}_*.down.sql)")]
    NoRollback(String),

    #[error("Error applying {file}: {source}")]
    Failed {
        file: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
