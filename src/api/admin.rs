//! Resilience introspection and bundle import handlers.

use crate::api::{ApiError, AppState, ImportResponse, ResetResponse};
use crate::config::ConfigBundle;
use crate::health::EndpointHealthRecord;
use crate::resilience::{BulkheadStats, CircuitBreakerSnapshot};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;

/// GET /v1/circuit-breakers
pub async fn circuit_breakers(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<CircuitBreakerSnapshot>> {
    Json(state.router.circuit_breakers())
}

/// POST /v1/circuit-breakers/:model_id/reset
///
/// 404 when no breaker exists for the model yet.
pub async fn reset_circuit_breaker(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    if !state.router.reset_circuit_breaker(&model_id) {
        return Err(ApiError::not_found(&format!(
            "No circuit breaker for model '{}'",
            model_id
        )));
    }
    tracing::info!(model_id = %model_id, "Circuit breaker reset via API");
    Ok(Json(ResetResponse {
        model_id,
        reset: true,
    }))
}

/// GET /v1/bulkheads
pub async fn bulkheads(State(state): State<Arc<AppState>>) -> Json<Vec<BulkheadStats>> {
    Json(state.router.bulkhead_stats())
}

/// GET /v1/endpoints
pub async fn endpoints(State(state): State<Arc<AppState>>) -> Json<Vec<EndpointHealthRecord>> {
    Json(state.router.endpoint_records())
}

/// POST /v1/import - Register models and replace the rule set.
pub async fn import(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ConfigBundle>, JsonRejection>,
) -> Result<Json<ImportResponse>, ApiError> {
    let Json(bundle) = body.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    let imported = bundle.apply(&state.registry, state.router.rules())?;
    Ok(Json(ImportResponse { imported }))
}
