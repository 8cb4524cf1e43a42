//! Routing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub weights: RoutingWeights,
    /// End-to-end deadline applied to every routed request
    pub request_deadline_ms: Option<u64>,
    /// Drop candidates whose circuit breaker is open when others remain
    pub skip_open_circuits: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            weights: RoutingWeights::default(),
            request_deadline_ms: None,
            skip_open_circuits: true,
        }
    }
}

impl RoutingConfig {
    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_deadline_ms.map(Duration::from_millis)
    }
}

/// Point values used by the model scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingWeights {
    /// Score for the first preferred model; each later index loses `preferred_step`
    pub preferred_base: f64,
    pub preferred_step: f64,
    pub fallback_base: f64,
    pub fallback_step: f64,
    pub critical_boost: f64,
    pub high_boost: f64,
    /// Bonus when a model declares the capability the request type needs
    pub capability_bonus: f64,
}

impl Default for RoutingWeights {
    fn default() -> Self {
        Self {
            preferred_base: 1000.0,
            preferred_step: 100.0,
            fallback_base: 500.0,
            fallback_step: 50.0,
            critical_boost: 200.0,
            high_boost: 100.0,
            capability_bonus: 50.0,
        }
    }
}

impl From<RoutingWeights> for crate::routing::ScoringWeights {
    fn from(weights: RoutingWeights) -> Self {
        crate::routing::ScoringWeights {
            preferred_base: weights.preferred_base,
            preferred_step: weights.preferred_step,
            fallback_base: weights.fallback_base,
            fallback_step: weights.fallback_step,
            critical_boost: weights.critical_boost,
            high_boost: weights.high_boost,
            capability_bonus: weights.capability_bonus,
        }
    }
}
