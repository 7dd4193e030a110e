// src/health/report.rs
use crate::config::{Deployment, Environment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Down,
}

impl OverallStatus {
    /// Fold the two reachability flags into one status.
    ///
    /// `Down` only when nothing is reachable; any partial reachability is `Degraded`.
    pub fn aggregate(api_reachable: bool, db_reachable: bool) -> Self {
        match (api_reachable, db_reachable) {
            (true, true) => OverallStatus::Healthy,
            (true, false) | (false, true) => OverallStatus::Degraded,
            (false, false) => OverallStatus::Down,
        }
    }

    pub fn as_gauge(self) -> i64 {
        match self {
            OverallStatus::Healthy => 0,
            OverallStatus::Degraded => 1,
            OverallStatus::Down => 2,
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OverallStatus::Healthy => "Healthy",
            OverallStatus::Degraded => "Degraded",
            OverallStatus::Down => "Down",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCheck {
    pub reachable: bool,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCheck {
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_counts: Option<BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DbCheck {
    pub fn unreachable(error_message: String) -> Self {
        Self {
            reachable: false,
            name: None,
            table_counts: None,
            migration_version: None,
            error_message: Some(error_message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub overall_status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub deployment: Deployment,
    pub api_check: ApiCheck,
    pub db_check: DbCheck,
}

impl HealthReport {
    /// The only constructor; keeps `overall_status` derived from the checks.
    pub fn new(
        api_check: ApiCheck,
        db_check: DbCheck,
        environment: Environment,
        deployment: Deployment,
    ) -> Self {
        Self {
            overall_status: OverallStatus::aggregate(api_check.reachable, db_check.reachable),
            timestamp: Utc::now(),
            environment,
            deployment,
            api_check,
            db_check,
        }
    }
}

/// Body returned when the report itself could not be produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBody {
    pub overall_status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

impl FailureBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            overall_status: OverallStatus::Down,
            timestamp: Utc::now(),
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(reachable: bool) -> ApiCheck {
        ApiCheck {
            reachable,
            base_url: "http://localhost:3001/".to_string(),
            latency_ms: reachable.then_some(42),
            error_message: (!reachable).then(|| "network error: connection refused".to_string()),
        }
    }

    fn db(reachable: bool) -> DbCheck {
        if reachable {
            DbCheck {
                reachable: true,
                name: Some("jobapp".to_string()),
                table_counts: Some(BTreeMap::from([("jobs".to_string(), 10)])),
                migration_version: None,
                error_message: None,
            }
        } else {
            DbCheck::unreachable("HTTP 503 Service Unavailable".to_string())
        }
    }

    #[test]
    fn test_precedence_table() {
        let cases = [
            (true, true, OverallStatus::Healthy),
            (true, false, OverallStatus::Degraded),
            (false, true, OverallStatus::Degraded),
            (false, false, OverallStatus::Down),
        ];

        for (api_ok, db_ok, expected) in cases {
            assert_eq!(OverallStatus::aggregate(api_ok, db_ok), expected);

            let report = HealthReport::new(
                api(api_ok),
                db(db_ok),
                Environment::Development,
                Deployment::Local,
            );
            assert_eq!(report.overall_status, expected, "api={} db={}", api_ok, db_ok);
        }
    }

    #[test]
    fn test_json_shape() {
        let report = HealthReport::new(
            api(true),
            db(true),
            Environment::Production,
            Deployment::Railway,
        );
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["overallStatus"], "Healthy");
        assert_eq!(value["environment"], "production");
        assert_eq!(value["deployment"], "railway");
        assert_eq!(value["apiCheck"]["reachable"], true);
        assert_eq!(value["apiCheck"]["latencyMs"], 42);
        assert!(value["apiCheck"].get("errorMessage").is_none());
        assert_eq!(value["dbCheck"]["tableCounts"]["jobs"], 10);
        assert!(value["dbCheck"].get("migrationVersion").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_unreachable_db_omits_details() {
        let value = serde_json::to_value(db(false)).unwrap();
        assert_eq!(value["reachable"], false);
        assert_eq!(value["errorMessage"], "HTTP 503 Service Unavailable");
        assert!(value.get("tableCounts").is_none());
        assert!(value.get("name").is_none());
    }
}
