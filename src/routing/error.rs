//! Error types for routing failures

use crate::provider::ProviderError;
use crate::registry::RegistryError;
use crate::resilience::{BreakerError, BulkheadError, IdempotencyError, RetryError};
use thiserror::Error;

/// Why a routed request did not produce a successful response.
///
/// `Router::route_request` never returns these directly; they end up in the
/// `error` field of an error [`ModelResponse`](crate::types::ModelResponse).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoutingError {
    /// No candidate survived rule matching, registry lookup and filtering
    #[error("No model available: {reason}")]
    NoModelAvailable { reason: String },

    /// The (request, model) pair was already executed
    #[error("Request '{request_id}' was already executed against model '{model_id}'")]
    DuplicateRequest { request_id: String, model_id: String },

    /// The model's circuit breaker rejected the call
    #[error("Circuit breaker open for model '{model_id}'")]
    CircuitOpen { model_id: String },

    /// Transient failures outlasted the retry budget
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ProviderError },

    /// Non-retriable provider failure (validation, auth, rate limit)
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// Per-call or end-to-end deadline exceeded
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl RoutingError {
    /// Stable snake_case identifier for responses, metrics and events.
    pub fn kind(&self) -> &'static str {
        match self {
            RoutingError::NoModelAvailable { .. } => "no_model_available",
            RoutingError::DuplicateRequest { .. } => "duplicate_request",
            RoutingError::CircuitOpen { .. } => "circuit_open",
            RoutingError::RetriesExhausted { .. } => "retries_exhausted",
            RoutingError::Provider(_) => "provider_error",
            RoutingError::Timeout { .. } => "timeout",
            RoutingError::Registry(_) => "registry_error",
        }
    }

    /// Map the result of the breaker-wrapped retry loop for `model_id`.
    pub fn from_pipeline(model_id: &str, err: BreakerError<RetryError<ProviderError>>) -> Self {
        match err {
            BreakerError::Open => RoutingError::CircuitOpen {
                model_id: model_id.to_string(),
            },
            BreakerError::Timeout(d) => RoutingError::Timeout {
                ms: d.as_millis() as u64,
            },
            BreakerError::Inner(RetryError::NonRetriable(e)) => RoutingError::Provider(e),
            BreakerError::Inner(RetryError::Exhausted { attempts, last }) => {
                RoutingError::RetriesExhausted { attempts, last }
            }
        }
    }
}

impl From<IdempotencyError> for RoutingError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::Duplicate {
                request_id,
                model_id,
            } => RoutingError::DuplicateRequest {
                request_id,
                model_id,
            },
        }
    }
}

impl From<BulkheadError> for RoutingError {
    fn from(err: BulkheadError) -> Self {
        RoutingError::NoModelAvailable {
            reason: err.to_string(),
        }
    }
}
