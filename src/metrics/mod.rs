//! # Metrics Collection Module
//!
//! Keeps a bounded in-process window of [`RequestMetric`]s for analytics and
//! mirrors every record into Prometheus.
//!
//! ## Metrics Exported
//!
//! **Counters:**
//! - `arbiter_requests_total{model, status}` - Routed requests
//! - `arbiter_tokens_total{model}` - Tokens consumed
//!
//! **Histograms:**
//! - `arbiter_request_duration_seconds{model}` - End-to-end routing latency
//!
//! **Gauges:**
//! - `arbiter_circuit_state{model}` - 0 closed, 1 half-open, 2 open
//! - `arbiter_bulkhead_in_flight{pool}` - Calls holding a bulkhead slot

pub mod analytics;
pub mod handler;
pub mod types;

pub use analytics::AnalyticsQuery;
pub use types::*;

pub use metrics_exporter_prometheus::PrometheusBuilder;

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Instant;

/// Bounded, thread-safe window of request metrics.
///
/// When full, the oldest record is evicted to make room.
#[derive(Debug)]
pub struct MetricsRecorder {
    window: RwLock<VecDeque<RequestMetric>>,
    capacity: usize,
    start_time: Instant,
}

impl MetricsRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            start_time: Instant::now(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record. Returns the window size afterwards.
    pub fn record(&self, metric: RequestMetric) -> usize {
        let model = metric.model_id.clone().unwrap_or_else(|| "none".to_string());
        metrics::counter!("arbiter_requests_total",
            "model" => model.clone(),
            "status" => metric.status.as_str()
        )
        .increment(1);
        metrics::histogram!("arbiter_request_duration_seconds", "model" => model.clone())
            .record(metric.latency_ms as f64 / 1000.0);
        if metric.total_tokens > 0 {
            metrics::counter!("arbiter_tokens_total", "model" => model)
                .increment(metric.total_tokens as u64);
        }

        let mut window = self.window.write().unwrap_or_else(|e| e.into_inner());
        if window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(metric);
        window.len()
    }

    /// Copy of every record, oldest first.
    pub fn snapshot(&self) -> Vec<RequestMetric> {
        self.window
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.window.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop records with a timestamp before `cutoff`. Returns how many were removed.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut window = self.window.write().unwrap_or_else(|e| e.into_inner());
        let before = window.len();
        window.retain(|m| m.timestamp >= cutoff);
        before - window.len()
    }

    /// Drop records older than `max_age`.
    pub fn prune_older_than(&self, max_age: std::time::Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self.prune_before(cutoff);
        if removed > 0 {
            tracing::debug!(removed, remaining = self.len(), "Pruned old request metrics");
        }
        removed
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Initialize the Prometheus exporter with latency and token buckets.
///
/// Duration buckets (seconds): 0.05 to 120. Token buckets: 10 to 128000.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let duration_buckets = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("arbiter_request_duration_seconds".to_string()),
            duration_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
