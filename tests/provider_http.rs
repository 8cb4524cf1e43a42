//! HttpProvider against a mock upstream.

mod common;

use arbiter::provider::{HttpProvider, ProviderCall, ProviderError};
use arbiter::registry::{Endpoint, InMemoryRegistry, ModelMetadata};
use arbiter::types::{ModelRequest, RequestType};
use common::fast_config;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn priced_model() -> ModelMetadata {
    let mut model = ModelMetadata::new("gpt-4", "openai").with_capabilities(["text-generation"]);
    model.input_cost_per_1k = 0.01;
    model.output_cost_per_1k = 0.03;
    model
}

fn request() -> ModelRequest {
    ModelRequest::new("creative", "ws-1", "Hello there", RequestType::Chat).with_id("req-1")
}

fn endpoint(server: &MockServer) -> Endpoint {
    Endpoint::new(format!("{}/v1/generate", server.uri()))
}

#[tokio::test]
async fn test_successful_call_parses_content_and_prices_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(body_partial_json(json!({
            "request_id": "req-1",
            "model": "gpt-4",
            "prompt": "Hello there",
            "request_type": "chat"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "General Kenobi",
            "usage": { "prompt_tokens": 1000, "completion_tokens": 500 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new(Duration::from_secs(5)).unwrap();
    let output = provider
        .call(&endpoint(&server), &priced_model(), &request())
        .await
        .unwrap();

    assert_eq!(output.content, "General Kenobi");
    assert_eq!(output.usage.total_tokens, 1500);
    assert!((output.usage.cost - 0.025).abs() < 1e-9);
}

#[tokio::test]
async fn test_reported_cost_wins_over_pricing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "ok",
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15, "cost": 0.5 }
        })))
        .mount(&server)
        .await;

    let provider = HttpProvider::new(Duration::from_secs(5)).unwrap();
    let output = provider
        .call(&endpoint(&server), &priced_model(), &request())
        .await
        .unwrap();

    assert_eq!(output.usage.total_tokens, 15);
    assert_eq!(output.usage.cost, 0.5);
}

#[tokio::test]
async fn test_error_status_maps_to_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let provider = HttpProvider::new(Duration::from_secs(5)).unwrap();
    let err = provider
        .call(&endpoint(&server), &priced_model(), &request())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::Upstream {
            status: 503,
            message: "overloaded".to_string()
        }
    );
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_unparseable_reply_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = HttpProvider::new(Duration::from_secs(5)).unwrap();
    let err = provider
        .call(&endpoint(&server), &priced_model(), &request())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::InvalidResponse(_)));
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "content": "late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let provider = HttpProvider::new(Duration::from_millis(100)).unwrap();
    let err = provider
        .call(&endpoint(&server), &priced_model(), &request())
        .await
        .unwrap_err();

    assert_eq!(err, ProviderError::Timeout(100));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let provider = HttpProvider::new(Duration::from_secs(2)).unwrap();
    let err = provider
        .call(
            &Endpoint::new("http://127.0.0.1:1/v1/generate"),
            &priced_model(),
            &request(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Network(_)));
}

#[tokio::test]
async fn test_router_retries_through_http_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "second time lucky",
            "usage": { "prompt_tokens": 3, "completion_tokens": 4 }
        })))
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryRegistry::new());
    registry.upsert_model(priced_model()).unwrap();
    registry
        .set_endpoints("gpt-4", vec![endpoint(&server)])
        .unwrap();
    registry.set_health("gpt-4", 100.0).unwrap();

    let provider = Arc::new(HttpProvider::new(Duration::from_secs(5)).unwrap());
    let router = arbiter::routing::Router::new(registry, provider, &fast_config());

    let response = router.route_request(&request()).await;

    assert!(response.is_success());
    assert_eq!(response.content, "second time lucky");
    assert_eq!(response.usage.total_tokens, 7);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
