//! # Metrics HTTP Handlers
//!
//! Axum handlers for the Prometheus scrape endpoint and the analytics API.

use super::{AnalyticsQuery, AnalyticsReport, MetricField};
use crate::api::{ApiError, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Handler for GET /metrics endpoint (Prometheus text format).
///
/// Always returns 200 with the Prometheus content type, even if nothing has
/// been recorded yet.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    for breaker in state.router.circuit_breakers() {
        metrics::gauge!("arbiter_circuit_state", "model" => breaker.model_id)
            .set(breaker.state.as_gauge());
    }
    for pool in state.router.bulkhead_stats() {
        metrics::gauge!("arbiter_bulkhead_in_flight", "pool" => pool.pool.clone())
            .set(pool.in_flight as f64);
    }

    let metrics = state.prometheus.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics,
    )
}

/// Query string for GET /v1/analytics.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    /// Look-back window in hours
    pub since_hours: Option<u32>,
    pub workspace_id: Option<String>,
    pub model_id: Option<String>,
    /// Extra grouping, e.g. `provider` or `agent_type`
    pub group_by: Option<String>,
}

impl AnalyticsParams {
    fn into_query(self) -> Result<(AnalyticsQuery, Option<MetricField>), ApiError> {
        let group = self
            .group_by
            .as_deref()
            .map(str::parse::<MetricField>)
            .transpose()
            .map_err(|e| ApiError::invalid_field("group_by", &e))?;

        // Windows reaching past the earliest representable instant cover everything.
        let since = self.since_hours.map(|h| {
            chrono::Duration::try_hours(i64::from(h))
                .and_then(|window| Utc::now().checked_sub_signed(window))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });

        Ok((
            AnalyticsQuery {
                since,
                workspace_id: self.workspace_id,
                model_id: self.model_id,
            },
            group,
        ))
    }
}

/// Handler for GET /v1/analytics endpoint (JSON format).
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let (query, group) = params.into_query()?;
    Ok(Json(state.router.analytics(&query, group)))
}
