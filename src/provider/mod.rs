//! Outbound model calls.
//!
//! The router never speaks a provider's wire protocol directly. It hands an
//! [`Endpoint`] and the request to a [`ProviderCall`] and gets back content
//! and token usage, or a [`ProviderError`] whose
//! [`is_retriable`](ProviderError::is_retriable) drives the retry policy.

mod error;
mod http;

pub use error::ProviderError;
pub use http::HttpProvider;

use crate::registry::{Endpoint, ModelMetadata};
use crate::types::{ModelRequest, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a provider returns for a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutput {
    pub content: String,
    pub usage: Usage,
}

/// Performs the actual call to a model endpoint.
///
/// Implementations must be cancellation-safe: dropping the future abandons
/// the call (the remote side may still complete it).
#[async_trait]
pub trait ProviderCall: Send + Sync + 'static {
    async fn call(
        &self,
        endpoint: &Endpoint,
        model: &ModelMetadata,
        request: &ModelRequest,
    ) -> Result<ProviderOutput, ProviderError>;
}
