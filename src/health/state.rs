//! Per-endpoint health state.

use super::config::EndpointHealthConfig;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Outcomes kept for the rolling success rate.
pub const ROLLING_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Healthy,
    Unhealthy,
}

/// Tracks call outcomes for a single endpoint.
#[derive(Debug, Clone)]
pub struct EndpointState {
    pub weight: u32,
    /// Exponential moving average of latency
    pub ema_latency_ms: Option<f64>,
    outcomes: VecDeque<bool>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub status: EndpointStatus,
    /// When the endpoint was last flagged unhealthy
    pub flagged_at: Option<Instant>,
}

impl EndpointState {
    pub fn new(weight: u32) -> Self {
        Self {
            weight,
            ema_latency_ms: None,
            outcomes: VecDeque::with_capacity(ROLLING_WINDOW),
            consecutive_failures: 0,
            consecutive_successes: 0,
            status: EndpointStatus::Healthy,
            flagged_at: None,
        }
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|ok| **ok).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    /// Fraction of recent calls that succeeded; 1.0 with no history.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            1.0
        } else {
            self.successes() as f64 / self.outcomes.len() as f64
        }
    }

    /// 0-100: 70% success rate, 30% latency relative to the ceiling.
    pub fn health_score(&self, config: &EndpointHealthConfig) -> f64 {
        let latency_score = match self.ema_latency_ms {
            Some(ms) if config.latency_ceiling_ms > 0 => {
                1.0 - (ms / config.latency_ceiling_ms as f64).min(1.0)
            }
            _ => 1.0,
        };
        (self.success_rate() * 70.0 + latency_score * 30.0).clamp(0.0, 100.0)
    }

    /// Healthy, or flagged long enough ago that it may be tried again.
    pub fn is_selectable(&self, cooldown: Duration, now: Instant) -> bool {
        match (self.status, self.flagged_at) {
            (EndpointStatus::Healthy, _) => true,
            (EndpointStatus::Unhealthy, Some(at)) => now.duration_since(at) >= cooldown,
            (EndpointStatus::Unhealthy, None) => true,
        }
    }

    /// Fold one call outcome in. Returns the new status on a transition.
    pub fn apply_result(
        &mut self,
        latency: Duration,
        success: bool,
        config: &EndpointHealthConfig,
        now: Instant,
    ) -> Option<EndpointStatus> {
        let sample = latency.as_secs_f64() * 1000.0;
        let alpha = config.ema_alpha.clamp(0.0, 1.0);
        self.ema_latency_ms = Some(match self.ema_latency_ms {
            Some(prev) => alpha * sample + (1.0 - alpha) * prev,
            None => sample,
        });

        if self.outcomes.len() == ROLLING_WINDOW {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);

        if success {
            self.consecutive_failures = 0;
            self.consecutive_successes += 1;
            match self.status {
                EndpointStatus::Unhealthy
                    if self.consecutive_successes >= config.recovery_threshold =>
                {
                    self.status = EndpointStatus::Healthy;
                    self.flagged_at = None;
                    Some(EndpointStatus::Healthy)
                }
                _ => None,
            }
        } else {
            self.consecutive_successes = 0;
            self.consecutive_failures += 1;
            match self.status {
                EndpointStatus::Healthy
                    if self.consecutive_failures >= config.failure_threshold =>
                {
                    self.status = EndpointStatus::Unhealthy;
                    self.flagged_at = Some(now);
                    Some(EndpointStatus::Unhealthy)
                }
                EndpointStatus::Unhealthy => {
                    // A failed retry after cooldown restarts the cooldown.
                    self.flagged_at = Some(now);
                    None
                }
                _ => None,
            }
        }
    }
}

/// Serializable view of an endpoint's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointHealthRecord {
    pub url: String,
    pub model_ids: Vec<String>,
    pub weight: u32,
    pub status: EndpointStatus,
    pub ema_latency_ms: Option<f64>,
    pub successes: usize,
    pub failures: usize,
    pub consecutive_failures: u32,
    pub health_score: f64,
}
