// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;
use url::Url;

/// Environment variables consulted, in order, for the gateway base URL.
pub const GATEWAY_URL_CANDIDATES: &[&str] = &["POSTGREST_URL", "NEXT_PUBLIC_API_URL"];

/// Environment variables consulted, in order, for the n8n base URL.
pub const N8N_URL_CANDIDATES: &[&str] = &["RAILWAY_N8N_URL", "N8N_URL"];

/// Load configuration from a file (YAML or JSON), then apply environment fallbacks.
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let mut config = parse_config(path, &contents)?;
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Defaults plus environment, for when no config file is given.
pub fn from_env() -> Result<Config> {
    let mut config = Config::default();
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn parse_config(path: &Path, contents: &str) -> Result<Config> {
    let ext = path.extension().and_then(|s| s.to_str());
    let config = if ext == Some("yaml") || ext == Some("yml") {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

/// First non-empty value among `candidates`.
pub fn first_present<F>(candidates: &[&str], lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    candidates
        .iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Fill unset values from the environment. Values from the config file win.
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if config.gateway.base_url.is_none() {
        if let Some(raw) = first_present(GATEWAY_URL_CANDIDATES, &lookup) {
            let url = Url::parse(&raw)
                .with_context(|| format!("Invalid gateway URL in environment: {}", raw))?;
            config.gateway.base_url = Some(url);
        }
    }

    if let Some(label) = first_present(&["APP_ENV", "NODE_ENV"], &lookup) {
        config.gateway.environment = Environment::from_label(&label);
    }
    if let Some(database_url) = first_present(&["DATABASE_URL"], &lookup) {
        config.gateway.deployment = Deployment::from_database_url(&database_url);
        if config.migrate.database_url.is_none() {
            config.migrate.database_url = Some(database_url);
        }
    }

    if let Some(url) = first_present(N8N_URL_CANDIDATES, &lookup) {
        config.deploy.n8n_url = url;
    }
    if config.deploy.api_key.is_none() {
        config.deploy.api_key = first_present(&["N8N_API_KEY"], &lookup);
    }

    let credential = &mut config.deploy.credential;
    if let Some(host) = lookup("RAILWAY_POSTGRES_HOST") {
        credential.host = host;
    }
    if let Some(database) = lookup("RAILWAY_POSTGRES_DB") {
        credential.database = database;
    }
    if let Some(user) = lookup("RAILWAY_POSTGRES_USER") {
        credential.user = user;
    }
    if let Some(password) = lookup("RAILWAY_POSTGRES_PASSWORD") {
        credential.password = password;
    }

    Ok(())
}
