//! Aggregate queries over recorded request metrics.
//!
//! All functions are pure and work on a slice, so callers take a snapshot
//! of the window once and run as many queries as they like against it.

use super::types::*;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Filter applied before aggregation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsQuery {
    /// Only metrics at or after this instant
    pub since: Option<DateTime<Utc>>,
    pub workspace_id: Option<String>,
    pub model_id: Option<String>,
}

impl AnalyticsQuery {
    pub fn matches(&self, metric: &RequestMetric) -> bool {
        self.since.map_or(true, |since| metric.timestamp >= since)
            && self
                .workspace_id
                .as_ref()
                .map_or(true, |ws| &metric.workspace_id == ws)
            && self
                .model_id
                .as_ref()
                .map_or(true, |m| metric.model_id.as_ref() == Some(m))
    }

    pub fn apply(&self, metrics: &[RequestMetric]) -> Vec<RequestMetric> {
        metrics.iter().filter(|m| self.matches(m)).cloned().collect()
    }
}

/// Mean latency in milliseconds; 0 for an empty set.
pub fn average_latency(metrics: &[RequestMetric]) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    metrics.iter().map(|m| m.latency_ms as f64).sum::<f64>() / metrics.len() as f64
}

/// Percentage (0-100) of successful requests; 0 for an empty set.
pub fn success_rate(metrics: &[RequestMetric]) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    let ok = metrics.iter().filter(|m| m.is_success()).count();
    ok as f64 * 100.0 / metrics.len() as f64
}

fn stats_for(key: String, metrics: &[&RequestMetric]) -> GroupStats {
    let requests = metrics.len();
    let successes = metrics.iter().filter(|m| m.is_success()).count();
    let latency_sum: f64 = metrics.iter().map(|m| m.latency_ms as f64).sum();
    GroupStats {
        key,
        requests,
        successes,
        success_rate: if requests == 0 {
            0.0
        } else {
            successes as f64 * 100.0 / requests as f64
        },
        average_latency_ms: if requests == 0 {
            0.0
        } else {
            latency_sum / requests as f64
        },
        total_tokens: metrics.iter().map(|m| m.total_tokens as u64).sum(),
        total_cost: metrics.iter().map(|m| m.cost).sum(),
    }
}

/// Group by `field`; groups sorted by request count descending, then key.
pub fn group_by(metrics: &[RequestMetric], field: MetricField) -> Vec<GroupStats> {
    let mut groups: HashMap<String, Vec<&RequestMetric>> = HashMap::new();
    for metric in metrics {
        groups.entry(field.key_of(metric)).or_default().push(metric);
    }
    let mut stats: Vec<GroupStats> = groups
        .into_iter()
        .map(|(key, members)| stats_for(key, &members))
        .collect();
    stats.sort_by(|a, b| b.requests.cmp(&a.requests).then_with(|| a.key.cmp(&b.key)));
    stats
}

pub fn workspace_rollups(metrics: &[RequestMetric]) -> Vec<GroupStats> {
    group_by(metrics, MetricField::Workspace)
}

pub fn model_rollups(metrics: &[RequestMetric]) -> Vec<GroupStats> {
    group_by(metrics, MetricField::Model)
}

/// 24 buckets, one per UTC hour of day, including empty hours.
pub fn hourly_distribution(metrics: &[RequestMetric]) -> Vec<HourlyBucket> {
    let mut counts = [0usize; 24];
    let mut latency = [0f64; 24];
    for metric in metrics {
        let hour = metric.timestamp.hour() as usize;
        counts[hour] += 1;
        latency[hour] += metric.latency_ms as f64;
    }
    (0..24)
        .map(|hour| HourlyBucket {
            hour: hour as u32,
            requests: counts[hour],
            average_latency_ms: if counts[hour] == 0 {
                0.0
            } else {
                latency[hour] / counts[hour] as f64
            },
        })
        .collect()
}

pub fn summary(metrics: &[RequestMetric]) -> AnalyticsSummary {
    let successful = metrics.iter().filter(|m| m.is_success()).count();
    AnalyticsSummary {
        total_requests: metrics.len(),
        successful_requests: successful,
        failed_requests: metrics.len() - successful,
        success_rate: success_rate(metrics),
        average_latency_ms: average_latency(metrics),
        total_tokens: metrics.iter().map(|m| m.total_tokens as u64).sum(),
        total_cost: metrics.iter().map(|m| m.cost).sum(),
    }
}

/// Summary, rollups and hourly distribution for the metrics `query` selects.
pub fn report(
    metrics: &[RequestMetric],
    query: &AnalyticsQuery,
    group: Option<MetricField>,
) -> AnalyticsReport {
    let selected = query.apply(metrics);
    AnalyticsReport {
        summary: summary(&selected),
        by_workspace: workspace_rollups(&selected),
        by_model: model_rollups(&selected),
        hourly: hourly_distribution(&selected),
        grouped: group.map(|field| group_by(&selected, field)),
    }
}

/// Bucket models by health score: healthy >= 80, degraded 60-79, unhealthy < 60.
pub fn system_health_overview(models: &[(String, f64)]) -> SystemHealthOverview {
    let mut entries: Vec<ModelHealthEntry> = models
        .iter()
        .map(|(model_id, score)| ModelHealthEntry {
            model_id: model_id.clone(),
            health_score: *score,
            bucket: HealthBucket::for_score(*score),
        })
        .collect();
    entries.sort_by(|a, b| a.model_id.cmp(&b.model_id));

    let count = |bucket: HealthBucket| entries.iter().filter(|e| e.bucket == bucket).count();
    let healthy = count(HealthBucket::Healthy);
    let degraded = count(HealthBucket::Degraded);
    let unhealthy = count(HealthBucket::Unhealthy);

    let status = if unhealthy > 0 {
        HealthBucket::Unhealthy
    } else if degraded > 0 {
        HealthBucket::Degraded
    } else {
        HealthBucket::Healthy
    };

    SystemHealthOverview {
        status,
        total_models: entries.len(),
        healthy,
        degraded,
        unhealthy,
        models: entries,
    }
}
