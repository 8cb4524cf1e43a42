//! Resilience pipeline behaviour observed through the router: circuit
//! breaking, retries, bulkheads, endpoint failover and deadlines.

mod common;

use arbiter::events::RouterEvent;
use arbiter::registry::Endpoint;
use arbiter::resilience::CircuitState;
use arbiter::types::ResponseStatus;
use common::*;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn breaker_opens_after_failure_ratio_and_recovers() {
    let registry = make_registry(&[("claude", "anthropic", 90.0)]);
    let provider = MockProvider::new();
    provider.script("claude", (0..10).map(|_| Err(upstream(400))).collect());
    let router = make_router(registry, provider.clone(), &fast_config());
    let mut events = router.events().subscribe();

    for _ in 0..10 {
        let response = router.route_request(&chat("creative", "ws")).await;
        assert_eq!(response.error.unwrap().kind, "provider_error");
    }
    assert_eq!(provider.calls(), 10);

    // Open: fail fast without touching the provider
    let response = router.route_request(&chat("creative", "ws")).await;
    assert_eq!(response.error.unwrap().kind, "circuit_open");
    assert_eq!(provider.calls(), 10);

    let mut transitions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RouterEvent::CircuitBreakerStateChange { from, to, .. } = event {
            transitions.push((from, to));
        }
    }
    assert_eq!(transitions, vec![(CircuitState::Closed, CircuitState::Open)]);

    // Still open just before the recovery timeout
    tokio::time::advance(Duration::from_secs(59)).await;
    let response = router.route_request(&chat("creative", "ws")).await;
    assert_eq!(response.error.unwrap().kind, "circuit_open");

    // Half-open probes succeed and close the breaker
    tokio::time::advance(Duration::from_secs(2)).await;
    for _ in 0..3 {
        let response = router.route_request(&chat("creative", "ws")).await;
        assert!(response.is_success());
    }
    assert_eq!(provider.calls(), 13);
    let snapshot = &router.circuit_breakers()[0];
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.window_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_reopens_breaker() {
    let registry = make_registry(&[("claude", "anthropic", 90.0)]);
    let provider = MockProvider::new();
    provider.script("claude", (0..11).map(|_| Err(upstream(401))).collect());
    let router = make_router(registry, provider.clone(), &fast_config());

    for _ in 0..10 {
        router.route_request(&chat("creative", "ws")).await;
    }
    tokio::time::advance(Duration::from_secs(61)).await;

    let probe = router.route_request(&chat("creative", "ws")).await;
    assert_eq!(probe.error.unwrap().kind, "provider_error");
    assert_eq!(router.circuit_breakers()[0].state, CircuitState::Open);

    let rejected = router.route_request(&chat("creative", "ws")).await;
    assert_eq!(rejected.error.unwrap().kind, "circuit_open");
    assert_eq!(provider.calls(), 11);
}

#[tokio::test(start_paused = true)]
async fn breaker_reset_restores_traffic() {
    let registry = make_registry(&[("claude", "anthropic", 90.0)]);
    let provider = MockProvider::new();
    provider.script("claude", (0..10).map(|_| Err(upstream(403))).collect());
    let router = make_router(registry, provider, &fast_config());

    for _ in 0..10 {
        router.route_request(&chat("creative", "ws")).await;
    }
    assert!(router.reset_circuit_breaker("claude"));
    assert!(!router.reset_circuit_breaker("unknown"));

    let response = router.route_request(&chat("creative", "ws")).await;
    assert!(response.is_success());
}

#[tokio::test(start_paused = true)]
async fn network_errors_are_retried_until_success() {
    let registry = make_registry(&[("claude", "anthropic", 90.0)]);
    let provider = MockProvider::new();
    provider.script("claude", vec![Err(network_error()), Err(network_error())]);
    let router = make_router(registry, provider.clone(), &fast_config());

    let response = router.route_request(&chat("creative", "ws")).await;

    assert!(response.is_success());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn rate_limits_and_validation_errors_are_not_retried() {
    for status in [400, 429] {
        let registry = make_registry(&[("claude", "anthropic", 90.0)]);
        let provider = MockProvider::new();
        provider.script("claude", vec![Err(upstream(status))]);
        let router = make_router(registry, provider.clone(), &fast_config());

        let response = router.route_request(&chat("creative", "ws")).await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error.unwrap().kind, "provider_error");
        assert_eq!(provider.calls(), 1, "status {}", status);
    }
}

#[tokio::test(start_paused = true)]
async fn persistent_gateway_errors_exhaust_retries() {
    let registry = make_registry(&[("claude", "anthropic", 90.0)]);
    let provider = MockProvider::new();
    provider.script("claude", (0..4).map(|_| Err(upstream(503))).collect());
    let router = make_router(registry, provider.clone(), &fast_config());

    let response = router.route_request(&chat("creative", "ws")).await;

    let error = response.error.unwrap();
    assert_eq!(error.kind, "retries_exhausted");
    assert!(error.message.contains("503"));
    assert_eq!(provider.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn bulkhead_caps_concurrent_calls_per_provider() {
    let registry = make_registry(&[("slow-model", "slowcorp", 90.0)]);
    let provider = MockProvider::new();
    provider.set_delay(Duration::from_millis(100));
    let mut config = fast_config();
    config.bulkhead.pools.insert("slowcorp".to_string(), 2);
    let router = make_router(registry, provider.clone(), &config);

    let requests: Vec<_> = (0..6).map(|_| chat("creative", "ws")).collect();
    let responses =
        futures::future::join_all(requests.iter().map(|r| router.route_request(r))).await;

    assert!(responses.iter().all(|r| r.is_success()));
    assert_eq!(provider.calls(), 6);
    assert_eq!(provider.max_in_flight(), 2);

    let pool = router
        .bulkhead_stats()
        .into_iter()
        .find(|s| s.pool == "slowcorp")
        .unwrap();
    assert_eq!(pool.capacity, 2);
    assert_eq!(pool.in_flight, 0);
    assert_eq!(pool.queued, 0);
}

#[tokio::test(start_paused = true)]
async fn unhealthy_endpoint_is_avoided_by_later_attempts() {
    let registry = make_registry(&[("claude", "anthropic", 90.0)]);
    let bad = "http://claude-a.test/v1/generate";
    let good = "http://claude-b.test/v1/generate";
    registry
        .set_endpoints("claude", vec![Endpoint::new(bad), Endpoint::new(good)])
        .unwrap();
    let provider = MockProvider::new();
    provider.fail_endpoint(bad, network_error());
    let router = make_router(registry, provider.clone(), &fast_config());

    for _ in 0..5 {
        let response = router.route_request(&chat("creative", "ws")).await;
        assert!(response.is_success());
    }

    let log = provider.call_log();
    assert!(log.iter().filter(|(_, url)| url == bad).count() <= 3);
    assert_eq!(log.iter().filter(|(_, url)| url == good).count(), 5);

    let records = router.endpoint_records();
    let good_record = records.iter().find(|r| r.url == good).unwrap();
    assert_eq!(good_record.successes, 5);
    assert_eq!(good_record.failures, 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_reports_timeout_and_failed_event() {
    let registry = make_registry(&[("claude", "anthropic", 90.0)]);
    let provider = MockProvider::new();
    provider.set_delay(Duration::from_secs(5));
    let mut config = fast_config();
    config.routing.request_deadline_ms = Some(250);
    let router = make_router(registry, provider, &config);
    let mut events = router.events().subscribe();

    let request = chat("creative", "ws");
    let response = router.route_request(&request).await;

    assert_eq!(response.request_id, request.id);
    assert_eq!(response.model_id.as_deref(), Some("claude"));
    assert_eq!(response.error.unwrap().kind, "timeout");

    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        if let RouterEvent::RequestFailed { error_kind, .. } = event {
            failed = Some(error_kind);
        }
    }
    assert_eq!(failed.as_deref(), Some("timeout"));
}
