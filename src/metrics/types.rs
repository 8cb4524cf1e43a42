//! # Metrics Types
//!
//! The per-request record kept in the in-process window, and the
//! serializable results of analytics queries over it.

use crate::types::{ModelRequest, ModelResponse, RequestType, ResponseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Denormalized record of one completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetric {
    pub request_id: String,
    pub model_id: Option<String>,
    pub provider: Option<String>,
    pub agent_type: String,
    pub workspace_id: String,
    pub request_type: RequestType,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub latency_ms: u64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost: f64,
    pub is_canary: bool,
    pub timestamp: DateTime<Utc>,
}

impl RequestMetric {
    /// Build the record for a request and the response produced for it.
    pub fn from_exchange(
        request: &ModelRequest,
        response: &ModelResponse,
        provider: Option<&str>,
    ) -> Self {
        Self {
            request_id: request.id.clone(),
            model_id: response.model_id.clone(),
            provider: provider.map(str::to_string),
            agent_type: request.agent_type.clone(),
            workspace_id: request.workspace_id.clone(),
            request_type: request.request_type,
            status: response.status,
            error_kind: response.error.as_ref().map(|e| e.kind.clone()),
            latency_ms: response.latency_ms,
            prompt_tokens: response.usage.prompt_tokens,
            completion_tokens: response.usage.completion_tokens,
            total_tokens: response.usage.total_tokens,
            cost: response.usage.cost,
            is_canary: response.is_canary,
            timestamp: response.timestamp,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Field a metric set can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Model,
    Provider,
    Workspace,
    AgentType,
    RequestType,
    Status,
    ErrorKind,
}

impl MetricField {
    /// Value of this field for a metric. Missing values group under `"none"`.
    pub fn key_of(&self, metric: &RequestMetric) -> String {
        let value = match self {
            MetricField::Model => metric.model_id.as_deref(),
            MetricField::Provider => metric.provider.as_deref(),
            MetricField::Workspace => Some(metric.workspace_id.as_str()),
            MetricField::AgentType => Some(metric.agent_type.as_str()),
            MetricField::RequestType => Some(metric.request_type.as_str()),
            MetricField::Status => Some(metric.status.as_str()),
            MetricField::ErrorKind => metric.error_kind.as_deref(),
        };
        value.unwrap_or("none").to_string()
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricField::Model => "model",
            MetricField::Provider => "provider",
            MetricField::Workspace => "workspace",
            MetricField::AgentType => "agent_type",
            MetricField::RequestType => "request_type",
            MetricField::Status => "status",
            MetricField::ErrorKind => "error_kind",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for MetricField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "model" | "model_id" => Ok(MetricField::Model),
            "provider" => Ok(MetricField::Provider),
            "workspace" | "workspace_id" => Ok(MetricField::Workspace),
            "agent_type" | "agent" => Ok(MetricField::AgentType),
            "request_type" => Ok(MetricField::RequestType),
            "status" => Ok(MetricField::Status),
            "error_kind" | "error" => Ok(MetricField::ErrorKind),
            _ => Err(format!("Unknown metric field: {}", s)),
        }
    }
}

/// Aggregates for one group of metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub key: String,
    pub requests: usize,
    pub successes: usize,
    /// Percentage, 0-100
    pub success_rate: f64,
    pub average_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost: f64,
}

/// Requests started in one UTC hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyBucket {
    /// 0-23
    pub hour: u32,
    pub requests: usize,
    pub average_latency_ms: f64,
}

/// Headline numbers for a metric set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub success_rate: f64,
    pub average_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost: f64,
}

/// Full analytics report returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub summary: AnalyticsSummary,
    pub by_workspace: Vec<GroupStats>,
    pub by_model: Vec<GroupStats>,
    pub hourly: Vec<HourlyBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped: Option<Vec<GroupStats>>,
}

/// Health bucket for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBucket {
    /// score >= 80
    Healthy,
    /// 60 <= score < 80
    Degraded,
    /// score < 60
    Unhealthy,
}

impl HealthBucket {
    pub fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthBucket::Healthy
        } else if score >= 60.0 {
            HealthBucket::Degraded
        } else {
            HealthBucket::Unhealthy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelHealthEntry {
    pub model_id: String,
    pub health_score: f64,
    pub bucket: HealthBucket,
}

/// Active models bucketed by health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealthOverview {
    /// Worst bucket that any model falls in; healthy when there are no models
    pub status: HealthBucket,
    pub total_models: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub models: Vec<ModelHealthEntry>,
}
