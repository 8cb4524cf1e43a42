//! Observability events emitted by the router.
//!
//! Events are delivered over a `tokio::sync::broadcast` channel. Emitting
//! never blocks and never fails the caller: with no subscribers the event is
//! dropped, and slow subscribers observe `RecvError::Lagged`.

use crate::resilience::CircuitState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default channel capacity for [`EventBus::new`].
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// An event describing something the router did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RouterEvent {
    #[serde(rename_all = "camelCase")]
    RequestRouted {
        request_id: String,
        model_id: String,
        agent_type: String,
        workspace_id: String,
        latency_ms: u64,
        total_tokens: u32,
        is_canary: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        deployment_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rule_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RequestFailed {
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model_id: Option<String>,
        agent_type: String,
        workspace_id: String,
        error_kind: String,
        message: String,
        latency_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    CircuitBreakerStateChange {
        model_id: String,
        from: CircuitState,
        to: CircuitState,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    MetricsRecorded {
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model_id: Option<String>,
        window_size: usize,
    },
}

impl RouterEvent {
    /// Event name as exposed to observability collaborators.
    pub fn name(&self) -> &'static str {
        match self {
            RouterEvent::RequestRouted { .. } => "requestRouted",
            RouterEvent::RequestFailed { .. } => "requestFailed",
            RouterEvent::CircuitBreakerStateChange { .. } => "circuitBreakerStateChange",
            RouterEvent::MetricsRecorded { .. } => "metricsRecorded",
        }
    }
}

/// Cloneable handle for publishing and subscribing to [`RouterEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: RouterEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit(RouterEvent::MetricsRecorded {
            request_id: "r".to_string(),
            model_id: None,
            window_size: 1,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(RouterEvent::CircuitBreakerStateChange {
            model_id: "gpt-4".to_string(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
            at: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "circuitBreakerStateChange");
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = RouterEvent::RequestFailed {
            request_id: "req-1".to_string(),
            model_id: Some("gpt-4".to_string()),
            agent_type: "creative".to_string(),
            workspace_id: "ws".to_string(),
            error_kind: "circuit_open".to_string(),
            message: "open".to_string(),
            latency_ms: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "requestFailed");
        assert_eq!(json["requestId"], "req-1");
        assert_eq!(json["errorKind"], "circuit_open");
    }
}
