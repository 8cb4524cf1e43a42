//! Routing endpoint handler.

use crate::api::{ApiError, AppState, RouteRequest};
use crate::types::ModelResponse;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;

/// POST /v1/route - Route one request.
///
/// Malformed bodies are rejected with 400. Everything after parsing answers
/// 200 with a ModelResponse, successful or not.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Json<ModelResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    let request = body.into_model_request();
    Ok(Json(state.router.route_request(&request).await))
}
