//! Routing rule administration handlers.

use crate::api::{ApiError, AppState};
use crate::rules::{RoutingRule, RuleDefinition, RuleUpdate};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

/// GET /v1/rules - Rules in evaluation order.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<RoutingRule>> {
    Json(state.router.list_rules())
}

/// GET /v1/rules/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoutingRule>, ApiError> {
    state
        .router
        .get_rule(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(&format!("Routing rule '{}' not found", id)))
}

/// POST /v1/rules
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RuleDefinition>, JsonRejection>,
) -> Result<(StatusCode, Json<RoutingRule>), ApiError> {
    let Json(definition) = body.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    let rule = state.router.add_rule(definition)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// PUT /v1/rules/:id - Partial update.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<RuleUpdate>, JsonRejection>,
) -> Result<Json<RoutingRule>, ApiError> {
    let Json(update) = body.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    Ok(Json(state.router.update_rule(&id, update)?))
}

/// DELETE /v1/rules/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoutingRule>, ApiError> {
    Ok(Json(state.router.delete_rule(&id)?))
}
