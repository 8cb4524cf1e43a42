//! Retry with exponential backoff and jitter.

use super::error::RetryError;
use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Runs an operation up to `max_retries + 1` times.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    ///
    /// `min(base * multiplier^attempt, max_delay)`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms as f64;
        let scaled = base * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = scaled.min(self.config.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Backoff with random jitter in `[0, jitter_ratio * delay]` added.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        let ratio = self.config.jitter_ratio.clamp(0.0, 1.0);
        if ratio == 0.0 || delay.is_zero() {
            return delay;
        }
        let jitter_ms = delay.as_millis() as f64 * ratio * rand::thread_rng().gen::<f64>();
        delay + Duration::from_millis(jitter_ms as u64)
    }

    /// Run `operation`, retrying while `retriable` accepts the error.
    ///
    /// The operation is re-created for each attempt so callers can make
    /// fresh choices (e.g. pick a different endpoint) every time.
    pub async fn execute<T, E, F, Fut, R>(
        &self,
        mut operation: F,
        retriable: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !retriable(&e) => {
                    tracing::debug!(attempt = attempt + 1, error = %e, "Error is not retriable");
                    return Err(RetryError::NonRetriable(e));
                }
                Err(e) => {
                    if attempt + 1 >= max_attempts {
                        tracing::warn!(attempts = max_attempts, error = %e, "Retries exhausted");
                        return Err(RetryError::Exhausted {
                            attempts: max_attempts,
                            last: e,
                        });
                    }
                    let delay = self.delay_with_jitter(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
