//! Health check endpoint handler.

use crate::api::{ApiError, AppState, HealthResponse};
use axum::{extract::State, Json};
use std::sync::Arc;

/// GET /health - Active models bucketed into healthy, degraded and unhealthy.
pub async fn handle(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let overview = state
        .router
        .system_health()
        .await
        .map_err(|e| ApiError::service_unavailable(&e.to_string()))?;

    let open_circuits = state
        .router
        .circuit_breakers()
        .iter()
        .filter(|b| b.state == crate::resilience::CircuitState::Open)
        .count();

    Ok(Json(HealthResponse {
        overview,
        uptime_seconds: state.uptime_seconds(),
        rules: state.router.rules().len(),
        open_circuits,
    }))
}
