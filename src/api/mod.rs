//! # Admin and Routing API
//!
//! Thin axum layer over the [`Router`](crate::routing::Router).
//!
//! ## Endpoints
//!
//! - `POST /v1/route` - Route a request, always answers with a ModelResponse
//! - `GET|POST /v1/rules`, `GET|PUT|DELETE /v1/rules/:id` - Rule administration
//! - `GET /v1/circuit-breakers`, `POST /v1/circuit-breakers/:model_id/reset`
//! - `GET /v1/bulkheads`, `GET /v1/endpoints` - Resilience introspection
//! - `POST /v1/import` - Import a configuration bundle (models + rules)
//! - `GET /v1/analytics` - Summary, rollups and hourly distribution
//! - `GET /health` - Active models bucketed by health
//! - `GET /metrics` - Prometheus exposition
//!
//! ## Example
//!
//! ```no_run
//! use arbiter::api::{create_router, AppState};
//! use arbiter::config::ArbiterConfig;
//! use arbiter::provider::HttpProvider;
//! use arbiter::registry::InMemoryRegistry;
//! use arbiter::routing::Router;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ArbiterConfig::default());
//! let registry = Arc::new(InMemoryRegistry::new());
//! let provider = Arc::new(HttpProvider::new(config.provider.timeout())?);
//! let router = Arc::new(Router::new(registry.clone(), provider, &config));
//!
//! let state = Arc::new(AppState::new(registry, router, config));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8100").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Administrative errors use one envelope:
//! ```json
//! {
//!   "error": {
//!     "message": "Routing rule 'r1' not found",
//!     "type": "invalid_request_error",
//!     "code": "not_found"
//!   }
//! }
//! ```
//! Routing failures are not HTTP errors: `/v1/route` answers 200 with an
//! error ModelResponse.

mod admin;
mod health;
mod route;
mod rules;
pub mod types;

pub use types::*;

use crate::config::ArbiterConfig;
use crate::registry::InMemoryRegistry;
use crate::routing;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared application state accessible to all handlers.
pub struct AppState {
    /// Registry the router reads and bundle imports write
    pub registry: Arc<InMemoryRegistry>,
    pub router: Arc<routing::Router>,
    pub config: Arc<ArbiterConfig>,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub fn new(
        registry: Arc<InMemoryRegistry>,
        router: Arc<routing::Router>,
        config: Arc<ArbiterConfig>,
    ) -> Self {
        // Safe to call multiple times - reuses a detached recorder if one is already installed
        let prometheus = crate::metrics::setup_metrics().unwrap_or_else(|e| {
            tracing::debug!("Metrics already initialized, creating new handle: {}", e);
            crate::metrics::PrometheusBuilder::new()
                .build_recorder()
                .handle()
        });

        Self {
            registry,
            router,
            config,
            start_time: Instant::now(),
            prometheus,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Create the API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;
    Router::new()
        .route("/v1/route", post(route::handle))
        .route("/v1/rules", get(rules::list).post(rules::create))
        .route(
            "/v1/rules/:id",
            get(rules::get).put(rules::update).delete(rules::delete),
        )
        .route("/v1/circuit-breakers", get(admin::circuit_breakers))
        .route(
            "/v1/circuit-breakers/:model_id/reset",
            post(admin::reset_circuit_breaker),
        )
        .route("/v1/bulkheads", get(admin::bulkheads))
        .route("/v1/endpoints", get(admin::endpoints))
        .route("/v1/import", post(admin::import))
        .route(
            "/v1/analytics",
            get(crate::metrics::handler::analytics_handler),
        )
        .route("/health", get(health::handle))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
