// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3001";
pub const DEFAULT_N8N_URL: &str = "http://localhost:5678";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub metrics: MetricsConfig,
    pub poller: PollerConfig,
    pub deploy: DeployConfig,
    pub migrate: MigrateConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.gateway.tables.is_empty() {
            bail!("gateway.tables must list at least one table");
        }
        if !self.gateway.tables.contains(&self.gateway.canonical_table) {
            bail!(
                "gateway.canonical_table '{}' must be one of gateway.tables",
                self.gateway.canonical_table
            );
        }
        if self.gateway.primary_timeout_ms == 0 || self.gateway.secondary_timeout_ms == 0 {
            bail!("gateway timeouts must be greater than zero");
        }
        if self.poller.interval_secs == 0 {
            bail!("poller.interval_secs must be greater than zero");
        }
        if let Some(code) = self.server.down_status_code {
            if code != 200 && !(500..600).contains(&code) {
                bail!("server.down_status_code must be 200 or a 5xx code, got {}", code);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Status returned when the report is `Down`. `None` means 200.
    pub down_status_code: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            down_status_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    Railway,
    #[default]
    Local,
}

impl Deployment {
    pub fn from_database_url(database_url: &str) -> Self {
        if database_url.contains("railway") {
            Deployment::Railway
        } else {
            Deployment::Local
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// `None` until resolved from the file or the environment candidates.
    pub base_url: Option<Url>,
    pub database_name: String,
    /// Table whose count query doubles as the reachability probe.
    pub canonical_table: String,
    pub tables: Vec<String>,
    pub migration_table: String,
    pub primary_timeout_ms: u64,
    pub secondary_timeout_ms: u64,
    pub environment: Environment,
    pub deployment: Deployment,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            database_name: "jobapp".to_string(),
            canonical_table: "jobs".to_string(),
            tables: vec![
                "jobs".to_string(),
                "applications".to_string(),
                "application_projects".to_string(),
            ],
            migration_table: "schema_migrations".to_string(),
            primary_timeout_ms: 5000,
            secondary_timeout_ms: 3000,
            environment: Environment::Development,
            deployment: Deployment::Local,
        }
    }
}

impl GatewayConfig {
    pub fn base_url(&self) -> Url {
        match &self.base_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_GATEWAY_URL).expect("default gateway url is valid"),
        }
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn secondary_timeout(&self) -> Duration {
        Duration::from_millis(self.secondary_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub url: String,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api/health".to_string(),
            interval_secs: 10,
            timeout_secs: 10,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub n8n_url: String,
    pub api_key: Option<String>,
    pub workflows_dir: String,
    pub dry_run: bool,
    pub credential: PostgresCredentialConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            n8n_url: DEFAULT_N8N_URL.to_string(),
            api_key: None,
            workflows_dir: "apps/n8n-workflows".to_string(),
            dry_run: false,
            credential: PostgresCredentialConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresCredentialConfig {
    pub name: String,
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub ssl: bool,
}

impl Default for PostgresCredentialConfig {
    fn default() -> Self {
        Self {
            name: "Railway PostgreSQL".to_string(),
            host: "localhost".to_string(),
            database: "jobapp".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            port: 5432,
            ssl: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Direct Postgres connection string; the gateway is not involved.
    pub database_url: Option<String>,
    pub migrations_dir: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            migrations_dir: "packages/database/migrations".to_string(),
        }
    }
}
