//! Request and response types shared by every routing stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Kind of work a request asks a model to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Completion,
    Chat,
    Embedding,
    Analysis,
}

impl RequestType {
    /// Capability tag a model must declare to serve this request type.
    pub fn required_capability(&self) -> &'static str {
        match self {
            RequestType::Completion | RequestType::Chat => "text-generation",
            RequestType::Embedding => "embeddings",
            RequestType::Analysis => "text-analysis",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Completion => "completion",
            RequestType::Chat => "chat",
            RequestType::Embedding => "embedding",
            RequestType::Analysis => "analysis",
        }
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completion" => Ok(RequestType::Completion),
            "chat" => Ok(RequestType::Chat),
            "embedding" => Ok(RequestType::Embedding),
            "analysis" => Ok(RequestType::Analysis),
            _ => Err(format!("Unknown request type: {}", s)),
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-assigned urgency of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    #[default]
    Normal,
    High,
    Critical,
}

impl RequestPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPriority::Normal => "normal",
            RequestPriority::High => "high",
            RequestPriority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RequestPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model invocation submitted by a calling agent.
///
/// Requests are treated as immutable once submitted; every routing stage
/// borrows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub id: String,
    pub agent_type: String,
    pub workspace_id: String,
    pub prompt: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub priority: RequestPriority,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ModelRequest {
    /// Create a request with a fresh UUID, normal priority and no metadata.
    pub fn new(
        agent_type: impl Into<String>,
        workspace_id: impl Into<String>,
        prompt: impl Into<String>,
        request_type: RequestType,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_type: agent_type.into(),
            workspace_id: workspace_id.into(),
            prompt: prompt.into(),
            request_type,
            priority: RequestPriority::Normal,
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Prompt length in characters, as used by content-length rule conditions.
    pub fn content_length(&self) -> usize {
        self.prompt.chars().count()
    }
}

/// Token accounting for a single model call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default)]
    pub cost: f64,
}

/// Outcome of a routed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Error => "error",
        }
    }
}

/// Structured failure carried by an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine-readable kind, e.g. `circuit_open`
    pub kind: String,
    pub message: String,
}

/// The single response produced for every [`ModelRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: String,
    pub request_id: String,
    /// Model that served (or was about to serve) the request; `None` when
    /// selection itself failed.
    pub model_id: Option<String>,
    pub content: String,
    pub usage: Usage,
    pub latency_ms: u64,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_canary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
}

impl ModelResponse {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}
