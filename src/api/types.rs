//! Request and response bodies of the HTTP API, and its error envelope.

use crate::config::{ImportError, ImportSummary};
use crate::metrics::SystemHealthOverview;
use crate::rules::RuleError;
use crate::types::{ModelRequest, RequestPriority, RequestType};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /v1/route`. The id is generated when absent.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub agent_type: String,
    pub workspace_id: String,
    pub prompt: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub priority: RequestPriority,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RouteRequest {
    pub fn into_model_request(self) -> ModelRequest {
        let mut request = ModelRequest::new(
            self.agent_type,
            self.workspace_id,
            self.prompt,
            self.request_type,
        )
        .with_priority(self.priority);
        if let Some(id) = self.id {
            request = request.with_id(id);
        }
        request.metadata = self.metadata;
        request
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub overview: SystemHealthOverview,
    pub uptime_seconds: u64,
    pub rules: usize,
    pub open_circuits: usize,
}

/// Body of `POST /v1/import`.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: ImportSummary,
}

/// Body of `POST /v1/circuit-breakers/:model_id/reset`.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub model_id: String,
    pub reset: bool,
}

/// API error response envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    fn new(message: impl Into<String>, r#type: &str, code: &str, param: Option<String>) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.into(),
                r#type: r#type.to_string(),
                param,
                code: Some(code.to_string()),
            },
        }
    }

    /// Create a bad request error (400).
    pub fn bad_request(message: &str) -> Self {
        Self::new(message, "invalid_request_error", "invalid_request_error", None)
    }

    /// Create a validation error (400) naming the offending field.
    pub fn invalid_field(field: &str, message: &str) -> Self {
        Self::new(
            format!("Invalid value for '{}': {}", field, message),
            "invalid_request_error",
            "invalid_request_error",
            Some(field.to_string()),
        )
    }

    /// Create a not found error (404).
    pub fn not_found(message: &str) -> Self {
        Self::new(message, "invalid_request_error", "not_found", None)
    }

    /// Create a conflict error (409).
    pub fn conflict(message: &str) -> Self {
        Self::new(message, "invalid_request_error", "conflict", None)
    }

    /// Create a service unavailable error (503).
    pub fn service_unavailable(message: &str) -> Self {
        Self::new(message, "server_error", "service_unavailable", None)
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.error.code.as_deref() {
            Some("invalid_request_error") => StatusCode::BAD_REQUEST,
            Some("not_found") => StatusCode::NOT_FOUND,
            Some("conflict") => StatusCode::CONFLICT,
            Some("service_unavailable") => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RuleError> for ApiError {
    fn from(err: RuleError) -> Self {
        match &err {
            RuleError::NotFound(_) => ApiError::not_found(&err.to_string()),
            RuleError::Duplicate(_) => ApiError::conflict(&err.to_string()),
            RuleError::Validation { field, message } => ApiError::invalid_field(field, message),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Rule(rule_err) => rule_err.into(),
            other => ApiError::bad_request(&other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_request_defaults() {
        let body: RouteRequest = serde_json::from_value(json!({
            "agent_type": "creative",
            "workspace_id": "ws",
            "prompt": "hi",
            "request_type": "chat"
        }))
        .unwrap();
        let request = body.into_model_request();
        assert_eq!(request.priority, RequestPriority::Normal);
        assert_eq!(request.id.len(), 36);
    }

    #[test]
    fn test_route_request_keeps_caller_id() {
        let body: RouteRequest = serde_json::from_value(json!({
            "id": "req-42",
            "agent_type": "creative",
            "workspace_id": "ws",
            "prompt": "hi",
            "request_type": "analysis",
            "priority": "critical",
            "metadata": {"trace": "abc"}
        }))
        .unwrap();
        let request = body.into_model_request();
        assert_eq!(request.id, "req-42");
        assert_eq!(request.priority, RequestPriority::Critical);
        assert_eq!(request.metadata["trace"], "abc");
    }

    #[test]
    fn test_rule_errors_map_to_status_codes() {
        let cases = [
            (RuleError::NotFound("r".into()), StatusCode::NOT_FOUND),
            (RuleError::Duplicate("r".into()), StatusCode::CONFLICT),
            (
                RuleError::Validation {
                    field: "name".into(),
                    message: "cannot be empty".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_invalid_field_sets_param() {
        let error = ApiError::invalid_field("target_models", "at least one target model is required");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["param"], "target_models");
        assert_eq!(json["error"]["code"], "invalid_request_error");
    }

    #[test]
    fn test_service_unavailable_status() {
        let response = ApiError::service_unavailable("registry down").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
