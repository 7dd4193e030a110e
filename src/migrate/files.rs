// src/migrate/files.rs
use super::MigrateError;
use std::path::{Path, PathBuf};

pub const DOWN_SUFFIX: &str = ".down.sql";

/// Every `*.sql` in `dir` except rollbacks, sorted by file name.
pub async fn pending_migrations(dir: &Path) -> Result<Vec<PathBuf>, MigrateError> {
    let mut files = sql_files(dir).await?;
    files.retain(|path| !file_name(path).ends_with(DOWN_SUFFIX));
    Ok(files)
}

/// The first `{number}*.down.sql` in `dir`, by file name.
pub async fn rollback_migration(dir: &Path, number: &str) -> Result<PathBuf, MigrateError> {
    sql_files(dir)
        .await?
        .into_iter()
        .find(|path| {
            let name = file_name(path);
            name.starts_with(number) && name.ends_with(DOWN_SUFFIX)
        })
        .ok_or_else(|| MigrateError::NoRollback(number.to_string()))
}

async fn sql_files(dir: &Path) -> Result<Vec<PathBuf>, MigrateError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MigrateError::MigrationsDirMissing(dir.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && file_name(&path).ends_with(".sql") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| file_name(a).cmp(file_name(b)));
    Ok(files)
}

pub(crate) fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), "SELECT 1;").unwrap();
        }
    }

    fn names(paths: &[PathBuf]) -> Vec<&str> {
        paths.iter().map(|p| file_name(p)).collect()
    }

    #[tokio::test]
    async fn test_pending_migrations_are_sorted_and_skip_rollbacks() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "002_postgrest_roles.sql",
                "001_initial_schema.sql",
                "001_initial_schema.down.sql",
                "010_indexes.sql",
                "README.md",
                "seed.sql.bak",
            ],
        );
        std::fs::create_dir(dir.path().join("003_dir.sql")).unwrap();

        let files = pending_migrations(dir.path()).await.unwrap();
        assert_eq!(
            names(&files),
            vec!["001_initial_schema.sql", "002_postgrest_roles.sql", "010_indexes.sql"]
        );
    }

    #[tokio::test]
    async fn test_empty_and_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pending_migrations(dir.path()).await.unwrap().is_empty());

        let missing = pending_migrations(&dir.path().join("nope")).await;
        assert!(matches!(missing, Err(MigrateError::MigrationsDirMissing(_))));
    }

    #[tokio::test]
    async fn test_rollback_file_matches_migration_number() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "001_initial_schema.sql",
                "001_initial_schema.down.sql",
                "002_postgrest_roles.sql",
                "002_postgrest_roles.down.sql",
            ],
        );

        let file = rollback_migration(dir.path(), "002").await.unwrap();
        assert_eq!(file_name(&file), "002_postgrest_roles.down.sql");

        let missing = rollback_migration(dir.path(), "003").await;
        assert!(matches!(missing, Err(MigrateError::NoRollback(n)) if n == "003"));
    }
}
