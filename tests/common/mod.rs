//! Shared test utilities for Arbiter integration tests.
//!
//! Provides a scriptable mock provider, registry builders and app builders
//! to reduce duplication across test files.

#![allow(dead_code)]

use arbiter::api::{create_router, AppState};
use arbiter::config::ArbiterConfig;
use arbiter::provider::{ProviderCall, ProviderError, ProviderOutput};
use arbiter::registry::{Endpoint, InMemoryRegistry, ModelMetadata};
use arbiter::routing::Router;
use arbiter::types::{ModelRequest, RequestType, Usage};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Mock Provider
// =============================================================================

/// Provider double that records calls and replays scripted outcomes.
///
/// Per-model scripts are consumed first, then per-endpoint failures apply,
/// otherwise the call succeeds with a canned answer.
#[derive(Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<String, VecDeque<Result<ProviderOutput, ProviderError>>>>,
    failing_endpoints: Mutex<HashMap<String, ProviderError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    log: Mutex<Vec<(String, String)>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue outcomes for calls to `model_id`.
    pub fn script(&self, model_id: &str, outcomes: Vec<Result<ProviderOutput, ProviderError>>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model_id.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Make every call that lands on `url` fail with `error`.
    pub fn fail_endpoint(&self, url: &str, error: ProviderError) {
        self.failing_endpoints
            .lock()
            .unwrap()
            .insert(url.to_string(), error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// (model_id, endpoint url) of every call, in order.
    pub fn call_log(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn called_models(&self) -> Vec<String> {
        self.call_log().into_iter().map(|(model, _)| model).collect()
    }
}

#[async_trait]
impl ProviderCall for MockProvider {
    async fn call(
        &self,
        endpoint: &Endpoint,
        model: &ModelMetadata,
        _request: &ModelRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push((model.id.clone(), endpoint.url.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&model.id)
            .and_then(VecDeque::pop_front);
        if let Some(outcome) = scripted {
            return outcome;
        }
        if let Some(error) = self.failing_endpoints.lock().unwrap().get(&endpoint.url) {
            return Err(error.clone());
        }
        Ok(output(&format!("answer from {}", model.id)))
    }
}

pub fn output(content: &str) -> ProviderOutput {
    ProviderOutput {
        content: content.to_string(),
        usage: Usage {
            prompt_tokens: 12,
            completion_tokens: 30,
            total_tokens: 42,
            cost: 0.002,
        },
    }
}

pub fn network_error() -> ProviderError {
    ProviderError::Network("connection refused".to_string())
}

pub fn upstream(status: u16) -> ProviderError {
    ProviderError::Upstream {
        status,
        message: format!("status {}", status),
    }
}

// =============================================================================
// Registry Builders
// =============================================================================

/// Active model with text generation and analysis capabilities.
pub fn make_model(id: &str, provider: &str) -> ModelMetadata {
    ModelMetadata::new(id, provider).with_capabilities(["text-generation", "text-analysis"])
}

pub fn endpoint_url(model_id: &str) -> String {
    format!("http://{}.test/v1/generate", model_id)
}

/// Register a model with one endpoint and the given health score.
pub fn register(registry: &InMemoryRegistry, model: ModelMetadata, health: f64) {
    let id = model.id.clone();
    registry.upsert_model(model).unwrap();
    registry
        .set_endpoints(&id, vec![Endpoint::new(endpoint_url(&id))])
        .unwrap();
    registry.set_health(&id, health).unwrap();
}

/// Registry with `(id, provider, health)` models, each with one endpoint.
pub fn make_registry(models: &[(&str, &str, f64)]) -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    for (id, provider, health) in models {
        register(&registry, make_model(id, provider), *health);
    }
    registry
}

// =============================================================================
// Router and App Builders
// =============================================================================

/// Default configuration with millisecond retry delays.
pub fn fast_config() -> ArbiterConfig {
    let mut config = ArbiterConfig::default();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config
}

pub fn make_router(
    registry: Arc<InMemoryRegistry>,
    provider: Arc<MockProvider>,
    config: &ArbiterConfig,
) -> Arc<Router> {
    Arc::new(Router::new(registry, provider, config))
}

/// Axum app over a router backed by `provider`.
pub fn make_app(
    registry: Arc<InMemoryRegistry>,
    provider: Arc<MockProvider>,
) -> (axum::Router, Arc<Router>) {
    let config = Arc::new(fast_config());
    let router = make_router(registry.clone(), provider, &config);
    let state = Arc::new(AppState::new(registry, router.clone(), config));
    (create_router(state), router)
}

pub fn chat(agent_type: &str, workspace_id: &str) -> ModelRequest {
    ModelRequest::new(agent_type, workspace_id, "Summarise the report", RequestType::Chat)
}
