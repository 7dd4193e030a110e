// src/health/prober.rs
use super::report::{ApiCheck, DbCheck, HealthReport};
use super::{HealthSource, ProbeError};
use crate::config::GatewayConfig;
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_RANGE};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use url::Url;

const OPENAPI_JSON: &str = "application/openapi+json";
const JSON: &str = "application/json";

/// Endpoints of the gateway, resolved once against the base URL.
#[derive(Debug, Clone)]
struct Endpoints {
    root: Url,
    reachability: Url,
    canonical_table: String,
    /// Every configured table except the canonical one.
    tables: Vec<(String, Url)>,
    migration: Url,
}

impl Endpoints {
    fn resolve(base: &Url, config: &GatewayConfig) -> Result<Self, ProbeError> {
        let mut root = base.clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }

        let mut reachability = root.join(&config.canonical_table)?;
        reachability
            .query_pairs_mut()
            .append_pair("select", "count")
            .append_pair("limit", "1");

        let tables = config
            .tables
            .iter()
            .filter(|table| **table != config.canonical_table)
            .map(|table| -> Result<(String, Url), ProbeError> {
                let mut url = root.join(table)?;
                url.query_pairs_mut().append_pair("select", "count");
                Ok((table.clone(), url))
            })
            .collect::<Result<Vec<_>, ProbeError>>()?;

        let mut migration = root.join(&config.migration_table)?;
        migration
            .query_pairs_mut()
            .append_pair("select", "version")
            .append_pair("order", "version.desc")
            .append_pair("limit", "1");

        Ok(Self {
            root,
            reachability,
            canonical_table: config.canonical_table.clone(),
            tables,
            migration,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MigrationRow {
    version: serde_json::Value,
}

/// Probes a PostgREST gateway and the database behind it.
///
/// Each call is one-shot and read-only: no retries, no state carried between calls.
pub struct Prober {
    config: GatewayConfig,
    endpoints: Endpoints,
    client: Client,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Prober {
    pub fn new(
        config: GatewayConfig,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<Self, ProbeError> {
        let endpoints = Endpoints::resolve(&config.base_url(), &config)?;
        let client = Client::builder().build()?;

        Ok(Self {
            config,
            endpoints,
            client,
            metrics,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.endpoints.root
    }

    /// Run one full probe pass and fold it into a report.
    pub async fn probe(&self) -> HealthReport {
        let api_check = self.probe_api().await;
        let db_check = self.probe_database().await;

        let report = HealthReport::new(
            api_check,
            db_check,
            self.config.environment,
            self.config.deployment,
        );

        if let Some(metrics) = &self.metrics {
            metrics.update_overall_status(report.overall_status);
        }

        info!(
            status = %report.overall_status,
            api = report.api_check.reachable,
            db = report.db_check.reachable,
            "Health probe complete"
        );
        report
    }

    /// Liveness of the gateway root.
    pub async fn probe_api(&self) -> ApiCheck {
        let limit = self.config.primary_timeout();
        let start = Instant::now();
        let result = self
            .get(&self.endpoints.root, OPENAPI_JSON, false, limit)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;
        self.record("api", result.is_ok(), start);

        let base_url = self.endpoints.root.to_string();
        match result {
            Ok(_) => ApiCheck {
                reachable: true,
                base_url,
                latency_ms: Some(latency_ms),
                error_message: None,
            },
            Err(e) => {
                warn!("API liveness probe failed: {}", e);
                ApiCheck {
                    reachable: false,
                    base_url,
                    latency_ms: matches!(e, ProbeError::Status(_)).then_some(latency_ms),
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    /// Reachability of the database, then best-effort table counts and migration version.
    pub async fn probe_database(&self) -> DbCheck {
        let start = Instant::now();
        let reachability = self
            .get(
                &self.endpoints.reachability,
                JSON,
                true,
                self.config.primary_timeout(),
            )
            .await;
        self.record("database", reachability.is_ok(), start);

        let response = match reachability {
            Ok(response) => response,
            Err(e) => {
                warn!("Database reachability probe failed: {}", e);
                return DbCheck::unreachable(e.to_string());
            }
        };

        let canonical = (
            self.endpoints.canonical_table.clone(),
            total_from_response(&response),
        );
        let mut counts = vec![canonical];
        counts.extend(self.count_tables().await);

        DbCheck {
            reachable: true,
            name: Some(self.config.database_name.clone()),
            table_counts: Some(self.flatten_counts(counts)),
            migration_version: self.migration_version().await,
            error_message: None,
        }
    }

    /// Count every non-canonical table concurrently; each outcome stands alone.
    async fn count_tables(&self) -> Vec<(String, Result<u64, ProbeError>)> {
        let limit = self.config.secondary_timeout();
        let tasks = self.endpoints.tables.iter().map(|(table, url)| async move {
            let start = Instant::now();
            let result = match self.get(url, JSON, true, limit).await {
                Ok(response) => total_from_response(&response),
                Err(e) => Err(e),
            };
            self.record("table", result.is_ok(), start);
            (table.clone(), result)
        });

        futures::future::join_all(tasks).await
    }

    fn flatten_counts(
        &self,
        counts: Vec<(String, Result<u64, ProbeError>)>,
    ) -> BTreeMap<String, u64> {
        let mut present = BTreeMap::new();
        for (table, result) in counts {
            match result {
                Ok(count) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.update_table_rows(&table, count);
                    }
                    present.insert(table, count);
                }
                Err(e) => warn!(table = %table, "Row count unavailable: {}", e),
            }
        }
        present
    }

    async fn migration_version(&self) -> Option<String> {
        let limit = self.config.secondary_timeout();
        let start = Instant::now();

        let result = match timeout(limit, self.fetch_migration_version(limit)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(limit.as_millis() as u64)),
        };
        self.record("migration", result.is_ok(), start);

        match result {
            Ok(version) => version,
            Err(e) => {
                debug!("Could not fetch migration version: {}", e);
                None
            }
        }
    }

    async fn fetch_migration_version(&self, limit: Duration) -> Result<Option<String>, ProbeError> {
        let response = self.get(&self.endpoints.migration, JSON, false, limit).await?;
        let rows: Vec<MigrationRow> = response
            .json()
            .await
            .map_err(|e| ProbeError::Decode(e.to_string()))?;

        Ok(rows.into_iter().next().and_then(|row| match row.version {
            serde_json::Value::String(version) => Some(version),
            serde_json::Value::Number(version) => Some(version.to_string()),
            _ => None,
        }))
    }

    /// One bounded GET; anything but a 2xx within `limit` is an error.
    async fn get(
        &self,
        url: &Url,
        accept: &str,
        exact_count: bool,
        limit: Duration,
    ) -> Result<Response, ProbeError> {
        let mut request = self.client.get(url.as_str()).header(ACCEPT, accept);
        if exact_count {
            request = request.header("Prefer", "count=exact");
        }

        match timeout(limit, request.send()).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(response),
            Ok(Ok(response)) => Err(ProbeError::Status(response.status())),
            Ok(Err(e)) => Err(ProbeError::Network(e)),
            Err(_) => Err(ProbeError::Timeout(limit.as_millis() as u64)),
        }
    }

    fn record(&self, check: &str, success: bool, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_probe(check, success, start.elapsed());
        }
    }
}

#[async_trait]
impl HealthSource for Prober {
    async fn report(&self) -> Result<HealthReport, ProbeError> {
        Ok(self.probe().await)
    }
}

fn total_from_response(response: &Response) -> Result<u64, ProbeError> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_range_total)
        .ok_or(ProbeError::MissingCount)
}

/// Total from a PostgREST `Content-Range` value: `0-24/25` → 25, `*/0` → 0.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    if total.is_empty() || !total.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    total.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/25"), Some(25));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total(" 0-0/10 "), Some(10));
        assert_eq!(parse_content_range_total("*/*"), None);
        assert_eq!(parse_content_range_total("0-24"), None);
        assert_eq!(parse_content_range_total("0-24/-1"), None);
        assert_eq!(parse_content_range_total(""), None);
    }

    #[test]
    fn test_endpoints_resolve_against_base_path() {
        let config = GatewayConfig::default();
        let base = Url::parse("http://gateway:3000/rest/v1").unwrap();
        let endpoints = Endpoints::resolve(&base, &config).unwrap();

        assert_eq!(endpoints.root.as_str(), "http://gateway:3000/rest/v1/");
        assert_eq!(
            endpoints.reachability.as_str(),
            "http://gateway:3000/rest/v1/jobs?select=count&limit=1"
        );
        let tables: Vec<&str> = endpoints.tables.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tables, vec!["applications", "application_projects"]);
        assert_eq!(
            endpoints.tables[0].1.as_str(),
            "http://gateway:3000/rest/v1/applications?select=count"
        );
        assert_eq!(
            endpoints.migration.as_str(),
            "http://gateway:3000/rest/v1/schema_migrations?select=version&order=version.desc&limit=1"
        );
    }
}
