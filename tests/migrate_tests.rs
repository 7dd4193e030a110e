// tests/migrate_tests.rs
use async_trait::async_trait;
use jobapp_ops::migrate::{MigrateError, MigrationRunner, ScriptExecutor};
use std::path::Path;

/// Records every script it runs; fails any script containing `FAIL`.
#[derive(Default)]
struct Recording {
    scripts: Vec<String>,
}

#[async_trait]
impl ScriptExecutor for Recording {
    async fn execute_script(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        self.scripts.push(sql.to_string());
        if sql.contains("FAIL") {
            return Err(sqlx::Error::Protocol("syntax error at or near \"FAIL\"".to_string()));
        }
        Ok(())
    }
}

fn write(dir: &Path, name: &str, sql: &str) {
    std::fs::write(dir.join(name), sql).unwrap();
}

#[tokio::test]
async fn test_applies_migrations_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "002_postgrest_roles.sql", "CREATE ROLE web_anon;");
    write(dir.path(), "001_initial_schema.sql", "CREATE TABLE jobs (id serial);");
    write(dir.path(), "001_initial_schema.down.sql", "DROP TABLE jobs;");

    let mut runner = MigrationRunner::new(Recording::default());
    let applied = runner.apply_all(dir.path()).await.unwrap();

    assert_eq!(applied, vec!["001_initial_schema.sql", "002_postgrest_roles.sql"]);
    assert_eq!(
        runner.into_inner().scripts,
        vec!["CREATE TABLE jobs (id serial);", "CREATE ROLE web_anon;"]
    );
}

#[tokio::test]
async fn test_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "001_a.sql", "SELECT 1;");
    write(dir.path(), "002_b.sql", "FAIL;");
    write(dir.path(), "003_c.sql", "SELECT 3;");

    let mut runner = MigrationRunner::new(Recording::default());
    let result = runner.apply_all(dir.path()).await;

    match result {
        Err(MigrateError::Failed { file, .. }) => assert_eq!(file, "002_b.sql"),
        other => panic!("expected a failed migration, got {:?}", other),
    }
    assert_eq!(runner.into_inner().scripts, vec!["SELECT 1;", "FAIL;"]);
}

#[tokio::test]
async fn test_empty_directory_applies_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "001_a.down.sql", "SELECT 1;");

    let mut runner = MigrationRunner::new(Recording::default());
    assert!(runner.apply_all(dir.path()).await.unwrap().is_empty());
    assert!(runner.into_inner().scripts.is_empty());
}

#[tokio::test]
async fn test_rollback_applies_matching_down_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "001_initial_schema.sql", "CREATE TABLE jobs (id serial);");
    write(dir.path(), "001_initial_schema.down.sql", "DROP TABLE jobs;");
    write(dir.path(), "002_postgrest_roles.down.sql", "DROP ROLE web_anon;");

    let mut runner = MigrationRunner::new(Recording::default());
    let file = runner.rollback(dir.path(), "001").await.unwrap();
    assert_eq!(file, "001_initial_schema.down.sql");

    let missing = runner.rollback(dir.path(), "007").await;
    assert!(matches!(missing, Err(MigrateError::NoRollback(_))));
    assert_eq!(runner.into_inner().scripts, vec!["DROP TABLE jobs;"]);
}

#[tokio::test]
async fn test_missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = MigrationRunner::new(Recording::default());

    let result = runner.apply_all(&dir.path().join("migrations")).await;
    assert!(matches!(result, Err(MigrateError::MigrationsDirMissing(_))));
}
