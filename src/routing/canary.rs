//! Optional canary deployment adapter.
//!
//! A canary system can take over model selection for some requests (to shift
//! a share of traffic to a new model version) and wants to hear how those
//! requests went. The router talks to it only through [`CanaryAdapter`].

use crate::types::{ModelRequest, ModelResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selection made by the canary system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryDecision {
    pub selected_model_id: String,
    pub is_canary: bool,
    pub deployment_id: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanaryError {
    #[error("Canary routing failed: {0}")]
    Routing(String),

    #[error("Canary metric recording failed: {0}")]
    Metric(String),
}

#[async_trait]
pub trait CanaryAdapter: Send + Sync + 'static {
    /// Pick a model for the request.
    ///
    /// `Ok(None)` means the canary system has no opinion and normal routing
    /// applies. Errors are logged by the router and also fall back to
    /// normal routing.
    async fn route_request(
        &self,
        request: &ModelRequest,
    ) -> Result<Option<CanaryDecision>, CanaryError>;

    /// Report the outcome of a request that went through a deployment.
    async fn record_request_metric(
        &self,
        deployment_id: &str,
        request: &ModelRequest,
        response: &ModelResponse,
        is_canary: bool,
    ) -> Result<(), CanaryError>;
}
