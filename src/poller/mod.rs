// src/poller/mod.rs
use crate::config::PollerConfig;
use crate::health::{HealthReport, ProbeError};
use crate::metrics::MetricsCollector;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

/// What the presenter currently shows.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Sequence number of the poll that produced this state; 0 before any poll.
    pub seq: u64,
    /// Last successfully fetched report. Survives later failed polls.
    pub report: Option<Arc<HealthReport>>,
    pub last_error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Polls the health endpoint on a fixed interval and keeps the newest result.
///
/// Polls may overlap; a result that completes after a newer one has been
/// applied is dropped.
pub struct StatusPoller {
    config: PollerConfig,
    client: Client,
    next_seq: AtomicU64,
    state: ArcSwap<PollState>,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl StatusPoller {
    pub fn new(
        config: PollerConfig,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<Self, ProbeError> {
        let client = Client::builder().build()?;
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Ok(Self {
            config,
            client,
            next_seq: AtomicU64::new(1),
            state: ArcSwap::from_pointee(PollState::default()),
            metrics,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn snapshot(&self) -> Arc<PollState> {
        self.state.load_full()
    }

    pub async fn start(self: Arc<Self>) {
        let mut ticker = interval(self.config.interval());
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Polling {} every {:?}",
            self.config.url,
            self.config.interval()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Not awaited: a slow poll must not delay the next tick.
                    tokio::spawn(self.clone().poll_once());
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Status poller shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Fetch once and apply the outcome. Returns whether it was applied.
    pub async fn poll_once(self: Arc<Self>) -> bool {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let outcome = self.fetch().await;
        self.apply(seq, outcome)
    }

    async fn fetch(&self) -> Result<HealthReport, ProbeError> {
        let limit = self.config.timeout();
        match timeout(limit, self.request_report()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(limit.as_millis() as u64)),
        }
    }

    async fn request_report(&self) -> Result<HealthReport, ProbeError> {
        let response = self.client.get(&self.config.url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // A 5xx carrying a full report (Down with a strict status code) is still a report.
        match serde_json::from_slice::<HealthReport>(&body) {
            Ok(report) => Ok(report),
            Err(_) if !status.is_success() => Err(ProbeError::Status(status)),
            Err(e) => Err(ProbeError::Decode(e.to_string())),
        }
    }

    /// Apply the outcome of poll `seq` unless a newer poll already landed.
    pub fn apply(&self, seq: u64, outcome: Result<HealthReport, ProbeError>) -> bool {
        let update: Result<Arc<HealthReport>, String> = match outcome {
            Ok(report) => Ok(Arc::new(report)),
            Err(e) => Err(e.to_string()),
        };
        let now = Utc::now();
        let mut applied = false;

        let previous = self.state.rcu(|current| {
            if seq <= current.seq {
                applied = false;
                return Arc::clone(current);
            }
            applied = true;

            let next = match &update {
                Ok(report) => PollState {
                    seq,
                    report: Some(report.clone()),
                    last_error: None,
                    last_update: Some(now),
                },
                Err(message) => PollState {
                    seq,
                    report: current.report.clone(),
                    last_error: Some(message.clone()),
                    last_update: current.last_update,
                },
            };
            Arc::new(next)
        });

        if !applied {
            debug!(seq, latest = previous.seq, "Discarding stale poll result");
            self.record("stale");
            return false;
        }

        match &update {
            Ok(report) => {
                self.record("applied");
                let before = previous.report.as_ref().map(|r| r.overall_status);
                if before != Some(report.overall_status) {
                    info!(
                        "Status changed: {} -> {}",
                        before.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
                        report.overall_status
                    );
                }
            }
            Err(message) => {
                self.record("failed");
                warn!("Failed to fetch health: {}", message);
            }
        }
        true
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_poll(outcome);
        }
    }
}
