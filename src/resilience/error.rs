//! Error types for the resilience components.

use std::time::Duration;
use thiserror::Error;

/// Failure of a call made through a [`CircuitBreaker`](super::CircuitBreaker).
#[derive(Debug, Error, PartialEq)]
pub enum BreakerError<E> {
    /// Breaker is open (or half-open with all probe slots taken)
    #[error("circuit breaker is open")]
    Open,

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Inner(E),
}

/// Failure of an operation run by a [`RetryExecutor`](super::RetryExecutor).
#[derive(Debug, Error, PartialEq)]
pub enum RetryError<E> {
    /// The operation failed with an error the policy refuses to retry
    #[error("non-retriable error: {0}")]
    NonRetriable(E),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The underlying operation error.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::NonRetriable(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BulkheadError {
    /// Pool semaphore was closed; the executor is shutting down
    #[error("bulkhead pool '{pool}' is closed")]
    Closed { pool: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdempotencyError {
    #[error("request '{request_id}' already executed against model '{model_id}'")]
    Duplicate {
        request_id: String,
        model_id: String,
    },
}
