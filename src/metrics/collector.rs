// src/metrics/collector.rs
use crate::health::OverallStatus;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Probe metrics
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub table_rows: IntGaugeVec,
    pub overall_status: IntGauge,

    // Endpoint metrics
    pub requests_total: IntCounterVec,

    // Poller metrics
    pub polls_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let probes_total = IntCounterVec::new(
            Opts::new("health_probes_total", "Outbound probes by check and outcome"),
            &["check", "outcome"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new("health_probe_duration_seconds", "Outbound probe duration"),
            &["check"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let table_rows = IntGaugeVec::new(
            Opts::new("health_table_rows", "Last observed row count per table"),
            &["table"],
        )?;
        registry.register(Box::new(table_rows.clone()))?;

        let overall_status = IntGauge::new(
            "health_overall_status",
            "Overall status (0=healthy, 1=degraded, 2=down)",
        )?;
        registry.register(Box::new(overall_status.clone()))?;

        let requests_total = IntCounterVec::new(
            Opts::new("health_requests_total", "Inbound requests by path and status"),
            &["path", "status_code"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let polls_total = IntCounterVec::new(
            Opts::new("health_polls_total", "Poller results by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(polls_total.clone()))?;

        Ok(Self {
            probes_total,
            probe_duration_seconds,
            table_rows,
            overall_status,
            requests_total,
            polls_total,
        })
    }

    pub fn record_probe(&self, check: &str, success: bool, duration: std::time::Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.probes_total
            .with_label_values(&[check, outcome])
            .inc();

        self.probe_duration_seconds
            .with_label_values(&[check])
            .observe(duration.as_secs_f64());
    }

    pub fn update_table_rows(&self, table: &str, rows: u64) {
        self.table_rows
            .with_label_values(&[table])
            .set(i64::try_from(rows).unwrap_or(i64::MAX));
    }

    pub fn update_overall_status(&self, status: OverallStatus) {
        self.overall_status.set(status.as_gauge());
    }

    pub fn record_request(&self, path: &str, status_code: u16) {
        let status = status_code.to_string();
        self.requests_total
            .with_label_values(&[path, &status])
            .inc();
    }

    /// `outcome` is one of `applied`, `failed` or `stale`.
    pub fn record_poll(&self, outcome: &str) {
        self.polls_total.with_label_values(&[outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_exposes_recorded_values() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_probe("api", true, std::time::Duration::from_millis(12));
        metrics.record_probe("table", false, std::time::Duration::from_millis(3000));
        metrics.update_table_rows("jobs", 10);
        metrics.update_overall_status(OverallStatus::Degraded);
        metrics.record_request("/api/health", 200);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains(r#"health_probes_total{check="api",outcome="success"} 1"#));
        assert!(text.contains(r#"health_probes_total{check="table",outcome="failure"} 1"#));
        assert!(text.contains(r#"health_table_rows{table="jobs"} 10"#));
        assert!(text.contains("health_overall_status 1"));
        assert!(text.contains(r#"health_requests_total{path="/api/health",status_code="200"} 1"#));
    }
}
