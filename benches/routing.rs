//! Benchmarks for model selection latency.
//!
//! Covers the pure stages (rule matching, scoring) and a full
//! `route_request` against an instant in-process provider.

use arbiter::config::ArbiterConfig;
use arbiter::provider::{ProviderCall, ProviderError, ProviderOutput};
use arbiter::registry::{AgentPreferences, Endpoint, InMemoryRegistry, ModelMetadata};
use arbiter::routing::{ModelScorer, Router, ScoringContext};
use arbiter::rules::{matching_rules, RuleCondition, RuleDefinition, RuleEngine, TargetModel};
use arbiter::types::{ModelRequest, RequestPriority, RequestType, Usage};
use async_trait::async_trait;
use chrono::NaiveTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

struct InstantProvider;

#[async_trait]
impl ProviderCall for InstantProvider {
    async fn call(
        &self,
        _endpoint: &Endpoint,
        model: &ModelMetadata,
        _request: &ModelRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput {
            content: model.id.clone(),
            usage: Usage::default(),
        })
    }
}

fn create_models(count: usize) -> Vec<ModelMetadata> {
    (0..count)
        .map(|i| {
            let capabilities: &[&str] = if i % 3 == 0 {
                &["embeddings"]
            } else {
                &["text-generation", "text-analysis"]
            };
            ModelMetadata::new(format!("model-{}", i), ["openai", "anthropic", "azure"][i % 3])
                .with_capabilities(capabilities.iter().copied())
        })
        .collect()
}

fn create_rules(count: usize) -> RuleEngine {
    let engine = RuleEngine::new();
    let definitions = (0..count)
        .map(|i| RuleDefinition {
            id: Some(format!("rule-{}", i)),
            name: format!("rule-{}", i),
            enabled: true,
            priority: (count - i) as i32,
            condition: RuleCondition {
                agent_types: Some(vec![format!("agent-{}", i % 7)]),
                request_types: (i % 2 == 0).then(|| vec![RequestType::Chat]),
                ..Default::default()
            },
            target_models: vec![TargetModel::new(format!("model-{}", i % 10), 1.0)],
        })
        .collect();
    engine.replace_all(definitions).unwrap();
    engine
}

fn request() -> ModelRequest {
    ModelRequest::new("agent-3", "ws-1", "Summarise this", RequestType::Chat)
        .with_priority(RequestPriority::High)
}

/// Score every candidate; selection is linear in candidate count.
fn bench_scoring_by_candidate_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let scorer = ModelScorer::default();
    let request = request();

    for count in [1, 5, 10, 25, 50] {
        let candidates = create_models(count);
        let context = ScoringContext {
            preferences: Some(AgentPreferences {
                preferred_models: vec!["model-2".to_string(), "model-4".to_string()],
                fallback_models: vec!["model-1".to_string()],
            }),
            workspace: None,
            health: candidates
                .iter()
                .enumerate()
                .map(|(i, m)| (m.id.clone(), (i * 7 % 100) as f64))
                .collect(),
        };

        group.bench_with_input(BenchmarkId::new("candidates", count), &count, |b, _| {
            b.iter(|| {
                black_box(
                    scorer
                        .select_best_model(&request, &candidates, &context)
                        .unwrap(),
                );
            });
        });
    }

    group.finish();
}

/// Match a request against rule sets of increasing size.
fn bench_rule_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_matching");
    let request = request();
    let now = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

    for count in [10, 100, 1000] {
        let engine = create_rules(count);
        group.bench_with_input(BenchmarkId::new("rules", count), &count, |b, _| {
            b.iter(|| {
                let snapshot = engine.snapshot();
                black_box(matching_rules(&snapshot, &request, now));
            });
        });
    }

    group.finish();
}

/// Full pipeline: rules, scoring, idempotency, bulkhead, breaker, retry, endpoint selection.
fn bench_route_request(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let registry = Arc::new(InMemoryRegistry::new());
    for model in create_models(10) {
        let id = model.id.clone();
        registry.upsert_model(model).unwrap();
        registry
            .set_endpoints(&id, vec![Endpoint::new(format!("http://{}.bench", id))])
            .unwrap();
        registry.set_health(&id, 90.0).unwrap();
    }
    let router = Router::new(registry, Arc::new(InstantProvider), &ArbiterConfig::default())
        .with_rule_engine(Arc::new(create_rules(50)));

    c.bench_function("route_request", |b| {
        b.iter(|| {
            let response = runtime.block_on(router.route_request(&request()));
            black_box(response);
        });
    });
}

criterion_group!(
    benches,
    bench_scoring_by_candidate_count,
    bench_rule_matching,
    bench_route_request
);
criterion_main!(benches);
