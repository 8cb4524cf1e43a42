//! Error types for provider calls.

use thiserror::Error;

/// Errors returned by a [`ProviderCall`](super::ProviderCall).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Connection refused, DNS failure and similar transport problems.
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Provider answered with a non-success status.
    #[error("Provider error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Provider answered 2xx with a body we could not use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Whether retrying the same call may succeed.
    ///
    /// Transport failures, timeouts and 502/503/504 are transient. Client
    /// errors (400, 401, 403, 404, 422) and rate limiting (429) are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout(_) => true,
            ProviderError::Upstream { status, .. } => matches!(status, 502..=504),
            ProviderError::InvalidResponse(_) | ProviderError::Configuration(_) => false,
        }
    }

    /// Stable snake_case kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "network",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Upstream { .. } => "upstream",
            ProviderError::InvalidResponse(_) => "invalid_response",
            ProviderError::Configuration(_) => "configuration",
        }
    }
}
