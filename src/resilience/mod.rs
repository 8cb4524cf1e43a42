//! Resilience layer wrapped around every provider call.
//!
//! Composition used by the router, outermost first:
//!
//! ```text
//! idempotency guard → bulkhead (per provider) → circuit breaker (per model) → retry → provider
//! ```

mod bulkhead;
mod circuit_breaker;
mod error;
mod idempotency;
mod retry;

pub use bulkhead::{BulkheadExecutor, BulkheadPool, BulkheadStats};
pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerRegistry, CircuitBreakerSnapshot, CircuitState,
};
pub use error::{BreakerError, BulkheadError, IdempotencyError, RetryError};
pub use idempotency::IdempotencyGuard;
pub use retry::RetryExecutor;
