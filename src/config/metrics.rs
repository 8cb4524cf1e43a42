//! Metrics window configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// In-process request metric retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Records kept before the oldest is evicted
    pub window_capacity: usize,
    /// Records older than this are pruned
    pub retention_seconds: u64,
    pub prune_interval_seconds: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_capacity: 10_000,
            retention_seconds: 86_400,
            prune_interval_seconds: 300,
        }
    }
}

impl MetricsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_seconds.max(1))
    }
}

/// Outbound provider call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// HTTP timeout for a single provider call
    pub timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
