//! Request routing and execution
//!
//! The [`Router`] turns a [`ModelRequest`] into exactly one [`ModelResponse`]:
//!
//! 1. Selection: the optional canary adapter first, otherwise rule matching,
//!    candidate gathering and scoring.
//! 2. Execution: idempotency guard, bulkhead (per provider), circuit breaker
//!    (per model) and retry around an endpoint-selected provider call.
//! 3. Accounting: metrics window, Prometheus, events, canary feedback.
//!
//! Failures at any step become an error response. `route_request` never
//! returns `Err`.

pub mod canary;
pub mod error;
pub mod scoring;


pub use canary::{CanaryAdapter, CanaryDecision, CanaryError};
pub use error::RoutingError;
pub use scoring::{
    apply_workspace_restrictions, ModelScorer, ScoreBreakdown, ScoringContext, ScoringWeights,
};

use crate::config::ArbiterConfig;
use crate::events::{EventBus, RouterEvent};
use crate::health::{EndpointHealthRecord, EndpointHealthSelector};
use crate::logging::truncate_prompt;
use crate::metrics::{
    analytics, AnalyticsQuery, AnalyticsReport, MetricField, MetricsRecorder, RequestMetric,
    SystemHealthOverview,
};
use crate::provider::{ProviderCall, ProviderError, ProviderOutput};
use crate::registry::{ModelMetadata, ModelRegistry};
use crate::resilience::{
    BulkheadExecutor, BulkheadStats, CircuitBreakerRegistry, CircuitBreakerSnapshot,
    IdempotencyGuard, RetryExecutor,
};
use crate::rules::{matching_rules, RoutingRule, RuleDefinition, RuleEngine, RuleError, RuleUpdate};
use crate::types::{ErrorInfo, ModelRequest, ModelResponse, ResponseStatus, Usage};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of the selection phase.
#[derive(Debug, Clone)]
struct Selection {
    model: ModelMetadata,
    rule_id: Option<String>,
    is_canary: bool,
    deployment_id: Option<String>,
}

/// Routes model requests to models and executes them under the resilience
/// pipeline.
///
/// All state is per key (model, provider, endpoint, request id) and safe to
/// share: wrap the router in an `Arc` and call it from any number of tasks.
pub struct Router {
    registry: Arc<dyn ModelRegistry>,
    provider: Arc<dyn ProviderCall>,
    rules: Arc<RuleEngine>,
    scorer: ModelScorer,
    breakers: CircuitBreakerRegistry,
    retry: RetryExecutor,
    bulkheads: BulkheadExecutor,
    idempotency: IdempotencyGuard,
    endpoints: EndpointHealthSelector,
    metrics: Arc<MetricsRecorder>,
    events: EventBus,
    canary: Option<Arc<dyn CanaryAdapter>>,
    skip_open_circuits: bool,
    request_deadline: Option<Duration>,
    call_timeout: Duration,
    content_logging: bool,
}

impl Router {
    /// Create a router with an empty rule set and its own event bus.
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        provider: Arc<dyn ProviderCall>,
        config: &ArbiterConfig,
    ) -> Self {
        let events = EventBus::default();
        Self {
            registry,
            provider,
            rules: Arc::new(RuleEngine::new()),
            scorer: ModelScorer::new(config.routing.weights.into()),
            breakers: CircuitBreakerRegistry::new(config.circuit_breaker.clone())
                .with_events(events.clone()),
            retry: RetryExecutor::new(config.retry.clone()),
            bulkheads: BulkheadExecutor::new(&config.bulkhead),
            idempotency: IdempotencyGuard::new(&config.idempotency),
            endpoints: EndpointHealthSelector::new(config.endpoint_health.clone()),
            metrics: Arc::new(MetricsRecorder::new(config.metrics.window_capacity)),
            events,
            canary: None,
            skip_open_circuits: config.routing.skip_open_circuits,
            request_deadline: config.routing.request_deadline(),
            call_timeout: config.circuit_breaker.call_timeout(),
            content_logging: config.logging.enable_content_logging,
        }
    }

    /// Route through a canary adapter before normal selection.
    pub fn with_canary(mut self, canary: Arc<dyn CanaryAdapter>) -> Self {
        self.canary = Some(canary);
        self
    }

    /// Share an existing rule engine instead of the empty default.
    pub fn with_rule_engine(mut self, rules: Arc<RuleEngine>) -> Self {
        self.rules = rules;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn registry(&self) -> &Arc<dyn ModelRegistry> {
        &self.registry
    }

    /// Route a request using the configured end-to-end deadline, if any.
    pub async fn route_request(&self, request: &ModelRequest) -> ModelResponse {
        match self.request_deadline {
            Some(deadline) => self.route_request_with_deadline(request, deadline).await,
            None => {
                let started = Instant::now();
                let selected = OnceLock::new();
                let result = self.select_and_execute(request, &selected).await;
                self.finish(request, selected.get(), result, started).await
            }
        }
    }

    /// Route a request, giving up after `deadline`.
    ///
    /// An abandoned call is reported as a `timeout` error response. The
    /// provider call already in flight is dropped, which does not guarantee
    /// the remote side stops working on it.
    pub async fn route_request_with_deadline(
        &self,
        request: &ModelRequest,
        deadline: Duration,
    ) -> ModelResponse {
        let started = Instant::now();
        let selected = OnceLock::new();
        let result =
            match tokio::time::timeout(deadline, self.select_and_execute(request, &selected)).await
            {
                Ok(result) => result,
                Err(_) => Err(RoutingError::Timeout {
                    ms: deadline.as_millis() as u64,
                }),
            };
        self.finish(request, selected.get(), result, started).await
    }

    async fn select_and_execute(
        &self,
        request: &ModelRequest,
        selected: &OnceLock<Selection>,
    ) -> Result<ProviderOutput, RoutingError> {
        if let Some(preview) = truncate_prompt(request, self.content_logging) {
            tracing::debug!(request_id = %request.id, prompt = %preview, "Routing request");
        }

        let selection = self.select_model(request).await?;
        let selection = selected.get_or_init(|| selection);
        self.execute(request, &selection.model).await
    }

    async fn select_model(&self, request: &ModelRequest) -> Result<Selection, RoutingError> {
        if let Some(selection) = self.select_via_canary(request).await? {
            return Ok(selection);
        }

        let (candidates, rule_id) = self.gather_candidates(request).await?;
        let candidates = self.drop_open_circuits(candidates);
        let context = self.scoring_context(request, &candidates).await?;
        let model = self
            .scorer
            .select_best_model(request, &candidates, &context)?;

        Ok(Selection {
            model,
            rule_id,
            is_canary: false,
            deployment_id: None,
        })
    }

    /// `Ok(None)` means normal routing applies.
    async fn select_via_canary(
        &self,
        request: &ModelRequest,
    ) -> Result<Option<Selection>, RoutingError> {
        let Some(canary) = &self.canary else {
            return Ok(None);
        };

        let decision = match canary.route_request(request).await {
            Ok(Some(decision)) => decision,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(request_id = %request.id, error = %e, "Canary routing failed, using normal routing");
                return Ok(None);
            }
        };

        let model = self
            .registry
            .get_model(&decision.selected_model_id)
            .await?
            .ok_or_else(|| RoutingError::NoModelAvailable {
                reason: format!(
                    "canary selected unknown model '{}'",
                    decision.selected_model_id
                ),
            })?;

        tracing::debug!(
            request_id = %request.id,
            model_id = %model.id,
            is_canary = decision.is_canary,
            deployment_id = ?decision.deployment_id,
            "Model selected by canary adapter"
        );

        Ok(Some(Selection {
            model,
            rule_id: None,
            is_canary: decision.is_canary,
            deployment_id: decision.deployment_id,
        }))
    }

    /// Candidates from the first matching rule with an available target,
    /// otherwise every active model serving the agent type.
    async fn gather_candidates(
        &self,
        request: &ModelRequest,
    ) -> Result<(Vec<ModelMetadata>, Option<String>), RoutingError> {
        let snapshot = self.rules.snapshot();
        let matched = matching_rules(&snapshot, request, Utc::now().time());

        for rule in &matched {
            let mut available = Vec::new();
            for model_id in rule.ordered_targets() {
                match self.registry.get_model(model_id).await? {
                    Some(model) if model.is_active() => available.push(model),
                    Some(_) => {
                        tracing::debug!(rule_id = %rule.id, model_id, "Rule target inactive")
                    }
                    None => {
                        tracing::debug!(rule_id = %rule.id, model_id, "Rule target not registered")
                    }
                }
            }
            if !available.is_empty() {
                tracing::debug!(
                    request_id = %request.id,
                    rule_id = %rule.id,
                    candidates = available.len(),
                    "Candidates from routing rule"
                );
                return Ok((available, Some(rule.id.clone())));
            }
        }

        let models = self
            .registry
            .get_active_models_for_agent(&request.agent_type)
            .await?;
        tracing::debug!(
            request_id = %request.id,
            agent_type = %request.agent_type,
            rules_matched = matched.len(),
            candidates = models.len(),
            "Candidates from active models for agent type"
        );
        Ok((models, None))
    }

    /// Remove models whose breaker would reject the call, unless that removes
    /// all of them.
    fn drop_open_circuits(&self, candidates: Vec<ModelMetadata>) -> Vec<ModelMetadata> {
        if !self.skip_open_circuits {
            return candidates;
        }
        let (closed, open): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|m| !self.breakers.is_rejecting(&m.id));
        if closed.is_empty() {
            open
        } else {
            if !open.is_empty() {
                tracing::debug!(skipped = open.len(), "Skipping candidates with open circuits");
            }
            closed
        }
    }

    async fn scoring_context(
        &self,
        request: &ModelRequest,
        candidates: &[ModelMetadata],
    ) -> Result<ScoringContext, RoutingError> {
        let preferences = self
            .registry
            .get_agent_preferences(&request.agent_type)
            .await?;
        let workspace = self
            .registry
            .get_workspace_config(&request.workspace_id)
            .await?;

        let mut health = HashMap::with_capacity(candidates.len());
        for model in candidates {
            health.insert(model.id.clone(), self.health_score(&model.id).await?);
        }

        Ok(ScoringContext {
            preferences,
            workspace,
            health,
        })
    }

    /// Registry score, else observed endpoint aggregate, else 0.
    async fn health_score(&self, model_id: &str) -> Result<f64, RoutingError> {
        if let Some(health) = self.registry.get_model_health(model_id).await? {
            return Ok(health.health_score);
        }
        Ok(self.endpoints.model_health_score(model_id).unwrap_or(0.0))
    }

    async fn execute(
        &self,
        request: &ModelRequest,
        model: &ModelMetadata,
    ) -> Result<ProviderOutput, RoutingError> {
        self.idempotency.check_and_register(&request.id, &model.id)?;

        let breaker = self.breakers.get_or_create(&model.id);
        let outcome = self
            .bulkheads
            .execute(&model.provider, || async {
                breaker
                    .run(|| {
                        self.retry.execute(
                            |attempt| self.attempt(request, model, attempt),
                            ProviderError::is_retriable,
                        )
                    })
                    .await
            })
            .await?;

        outcome.map_err(|e| RoutingError::from_pipeline(&model.id, e))
    }

    /// One provider call, bounded by the per-call timeout. Each attempt
    /// picks an endpoint afresh.
    async fn attempt(
        &self,
        request: &ModelRequest,
        model: &ModelMetadata,
        attempt: u32,
    ) -> Result<ProviderOutput, ProviderError> {
        let endpoints = self
            .registry
            .get_model_endpoints(&model.id)
            .await
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        let endpoint = self
            .endpoints
            .select_endpoint(&model.id, &endpoints)
            .ok_or_else(|| {
                ProviderError::Configuration(format!("model '{}' has no endpoints", model.id))
            })?;

        let started = Instant::now();
        let call = self.provider.call(&endpoint, model, request);
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.call_timeout.as_millis() as u64)),
        };
        let latency = started.elapsed();
        self.endpoints
            .record_result(&model.id, &endpoint.url, latency, result.is_ok());

        match &result {
            Ok(_) => tracing::debug!(
                request_id = %request.id,
                model_id = %model.id,
                endpoint = %endpoint.url,
                attempt = attempt + 1,
                latency_ms = latency.as_millis() as u64,
                "Provider call succeeded"
            ),
            Err(e) => tracing::debug!(
                request_id = %request.id,
                model_id = %model.id,
                endpoint = %endpoint.url,
                attempt = attempt + 1,
                latency_ms = latency.as_millis() as u64,
                error = %e,
                "Provider call failed"
            ),
        }

        result
    }

    /// Build the single response for `request`, then record and publish it.
    async fn finish(
        &self,
        request: &ModelRequest,
        selection: Option<&Selection>,
        result: Result<ProviderOutput, RoutingError>,
        started: Instant,
    ) -> ModelResponse {
        let latency_ms = started.elapsed().as_millis() as u64;
        let model_id = selection.map(|s| s.model.id.clone());

        let (content, usage, status, error) = match result {
            Ok(output) => (output.content, output.usage, ResponseStatus::Success, None),
            Err(e) => (
                String::new(),
                Usage::default(),
                ResponseStatus::Error,
                Some(ErrorInfo {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }),
            ),
        };

        let response = ModelResponse {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request.id.clone(),
            model_id: model_id.clone(),
            content,
            usage,
            latency_ms,
            status,
            error,
            timestamp: Utc::now(),
            is_canary: selection.map(|s| s.is_canary).unwrap_or(false),
            deployment_id: selection.and_then(|s| s.deployment_id.clone()),
        };

        let provider = selection.map(|s| s.model.provider.as_str());
        let window_size = self
            .metrics
            .record(RequestMetric::from_exchange(request, &response, provider));
        self.events.emit(RouterEvent::MetricsRecorded {
            request_id: request.id.clone(),
            model_id: model_id.clone(),
            window_size,
        });

        match &response.error {
            None => {
                tracing::info!(
                    request_id = %request.id,
                    model_id = model_id.as_deref().unwrap_or_default(),
                    agent_type = %request.agent_type,
                    latency_ms,
                    total_tokens = response.usage.total_tokens,
                    "Request routed"
                );
                self.events.emit(RouterEvent::RequestRouted {
                    request_id: request.id.clone(),
                    model_id: model_id.clone().unwrap_or_default(),
                    agent_type: request.agent_type.clone(),
                    workspace_id: request.workspace_id.clone(),
                    latency_ms,
                    total_tokens: response.usage.total_tokens,
                    is_canary: response.is_canary,
                    deployment_id: response.deployment_id.clone(),
                    rule_id: selection.and_then(|s| s.rule_id.clone()),
                });
            }
            Some(error) => {
                tracing::warn!(
                    request_id = %request.id,
                    model_id = ?model_id,
                    agent_type = %request.agent_type,
                    error_kind = %error.kind,
                    latency_ms,
                    "Request failed: {}",
                    error.message
                );
                self.events.emit(RouterEvent::RequestFailed {
                    request_id: request.id.clone(),
                    model_id: model_id.clone(),
                    agent_type: request.agent_type.clone(),
                    workspace_id: request.workspace_id.clone(),
                    error_kind: error.kind.clone(),
                    message: error.message.clone(),
                    latency_ms,
                });
            }
        }

        if let (Some(canary), Some(deployment_id)) = (&self.canary, &response.deployment_id) {
            if let Err(e) = canary
                .record_request_metric(deployment_id, request, &response, response.is_canary)
                .await
            {
                tracing::warn!(request_id = %request.id, deployment_id = %deployment_id, error = %e, "Canary metric recording failed");
            }
        }

        response
    }

    // Administrative operations

    pub fn list_rules(&self) -> Vec<RoutingRule> {
        self.rules.list_rules()
    }

    pub fn get_rule(&self, id: &str) -> Option<RoutingRule> {
        self.rules.get_rule(id)
    }

    pub fn add_rule(&self, definition: RuleDefinition) -> Result<RoutingRule, RuleError> {
        self.rules.add_rule(definition)
    }

    pub fn update_rule(&self, id: &str, update: RuleUpdate) -> Result<RoutingRule, RuleError> {
        self.rules.update_rule(id, update)
    }

    pub fn delete_rule(&self, id: &str) -> Result<RoutingRule, RuleError> {
        self.rules.delete_rule(id)
    }

    /// Force a model's breaker closed. Returns `false` if the model has no breaker yet.
    pub fn reset_circuit_breaker(&self, model_id: &str) -> bool {
        self.breakers.reset(model_id)
    }

    pub fn circuit_breakers(&self) -> Vec<CircuitBreakerSnapshot> {
        self.breakers.snapshots()
    }

    pub fn bulkhead_stats(&self) -> Vec<BulkheadStats> {
        self.bulkheads.all_stats()
    }

    pub fn endpoint_records(&self) -> Vec<EndpointHealthRecord> {
        self.endpoints.endpoint_records()
    }

    /// Drop expired idempotency keys. Returns how many were removed.
    pub fn purge_idempotency(&self) -> usize {
        self.idempotency.purge_expired()
    }

    pub fn prune_metrics(&self, max_age: Duration) -> usize {
        self.metrics.prune_older_than(max_age)
    }

    pub fn analytics(&self, query: &AnalyticsQuery, group: Option<MetricField>) -> AnalyticsReport {
        analytics::report(&self.metrics.snapshot(), query, group)
    }

    /// Health buckets over every active model.
    pub async fn system_health(&self) -> Result<SystemHealthOverview, RoutingError> {
        let models = self.registry.list_models().await?;
        let mut scores = Vec::new();
        for model in models.into_iter().filter(ModelMetadata::is_active) {
            let score = self.health_score(&model.id).await?;
            scores.push((model.id, score));
        }
        Ok(analytics::system_health_overview(&scores))
    }

    /// Reject new work in every bulkhead pool.
    pub fn shutdown(&self) {
        self.bulkheads.shutdown();
    }
}
