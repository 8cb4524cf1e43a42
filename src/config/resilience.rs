//! Resilience configuration: circuit breaking, retries, bulkheads and idempotency

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-model circuit breaker settings.
///
/// # Example
///
/// ```toml
/// [circuit_breaker]
/// failure_threshold = 0.5
/// minimum_requests = 10
/// recovery_timeout_ms = 60000
/// half_open_max_calls = 3
/// call_timeout_ms = 30000
/// window_ms = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio (0.0-1.0) in the rolling window that opens the breaker
    pub failure_threshold: f64,
    /// Calls that must be observed in the window before the ratio is trusted
    pub minimum_requests: u32,
    /// Time spent Open before probing in Half-Open
    pub recovery_timeout_ms: u64,
    /// Concurrent probes in Half-Open; this many consecutive successes close the breaker
    pub half_open_max_calls: u32,
    /// Per-call deadline; exceeding it counts as a failure
    pub call_timeout_ms: u64,
    /// Length of the rolling outcome window
    pub window_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            minimum_requests: 10,
            recovery_timeout_ms: 60_000,
            half_open_max_calls: 3,
            call_timeout_ms: 30_000,
            window_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Retry policy with exponential backoff and jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter as a fraction of the computed delay
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter_ratio: 0.1,
        }
    }
}

/// Concurrency pools keyed by provider name.
///
/// Providers without a pool of their own share the `default` pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    pub pools: HashMap<String, usize>,
}

/// Name of the pool shared by providers without a dedicated one.
pub const DEFAULT_POOL: &str = "default";

impl Default for BulkheadConfig {
    fn default() -> Self {
        let pools = [("openai", 10), ("anthropic", 8), ("azure", 12), (DEFAULT_POOL, 5)]
            .into_iter()
            .map(|(name, capacity)| (name.to_string(), capacity))
            .collect();
        Self { pools }
    }
}

impl BulkheadConfig {
    /// Capacity of the shared default pool.
    pub fn default_capacity(&self) -> usize {
        self.pools.get(DEFAULT_POOL).copied().unwrap_or(5)
    }
}

/// Duplicate-execution guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// How long a (request, model) key blocks re-execution
    pub ttl_seconds: u64,
    /// How often expired keys are swept by the server
    pub sweep_interval_seconds: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3_600,
            sweep_interval_seconds: 60,
        }
    }
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}
