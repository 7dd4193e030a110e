// src/health/mod.rs
mod prober;
mod report;

pub use prober::{parse_content_range_total, Prober};
pub use report::{ApiCheck, DbCheck, FailureBody, HealthReport, OverallStatus};

use async_trait::async_trait;

/// Anything that can produce a health report on demand.
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Individual check failures live inside the report; `Err` is reserved
    /// for failures that prevent a report from being built at all.
    async fn report(&self) -> Result<HealthReport, ProbeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("network error: {}", root_cause(.0))]
    Network(#[from] reqwest::Error),

    #[error("missing or malformed Content-Range header")]
    MissingCount,

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Innermost message of an error chain; reqwest wraps the useful part
/// (`Connection refused`) several layers deep.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
