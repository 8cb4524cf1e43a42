//! Configuration for endpoint health tracking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How an endpoint is picked among the healthy ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Random pick weighted by configured weight times health score
    #[default]
    WeightedRandom,
    /// Rotate through healthy endpoints per model
    RoundRobin,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::WeightedRandom => write!(f, "weighted_random"),
            SelectionStrategy::RoundRobin => write!(f, "round_robin"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "weighted_random" | "weighted" => Ok(SelectionStrategy::WeightedRandom),
            "round_robin" => Ok(SelectionStrategy::RoundRobin),
            _ => Err(format!("Unknown endpoint selection strategy: {}", s)),
        }
    }
}

/// Endpoint health settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointHealthConfig {
    pub strategy: SelectionStrategy,
    /// Consecutive failures before an endpoint is flagged unhealthy
    pub failure_threshold: u32,
    /// Consecutive successes before a flagged endpoint is healthy again
    pub recovery_threshold: u32,
    /// Seconds a flagged endpoint sits out before it is tried again
    pub cooldown_seconds: u64,
    /// Latency at or above which the latency component scores zero
    pub latency_ceiling_ms: u64,
    /// Smoothing factor for the latency moving average
    pub ema_alpha: f64,
}

impl Default for EndpointHealthConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::default(),
            failure_threshold: 3,
            recovery_threshold: 2,
            cooldown_seconds: 30,
            latency_ceiling_ms: 10_000,
            ema_alpha: 0.2,
        }
    }
}

impl EndpointHealthConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_both_spellings() {
        assert_eq!(
            "round-robin".parse::<SelectionStrategy>().unwrap(),
            SelectionStrategy::RoundRobin
        );
        assert_eq!(
            "Weighted_Random".parse::<SelectionStrategy>().unwrap(),
            SelectionStrategy::WeightedRandom
        );
        assert!("fastest".parse::<SelectionStrategy>().is_err());
    }

    #[test]
    fn strategy_display_round_trips() {
        for strategy in [SelectionStrategy::WeightedRandom, SelectionStrategy::RoundRobin] {
            assert_eq!(strategy.to_string().parse::<SelectionStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn defaults() {
        let config = EndpointHealthConfig::default();
        assert_eq!(config.strategy, SelectionStrategy::WeightedRandom);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown(), Duration::from_secs(30));
    }
}
