//! Per-model circuit breaker.
//!
//! ```text
//! Closed    → Open:      >= minimum_requests in window and failure ratio >= threshold
//! Open      → Half-Open: recovery_timeout elapsed (checked lazily on the next call)
//! Half-Open → Closed:    half_open_max_calls consecutive probe successes
//! Half-Open → Open:      any probe failure (recovery timer restarts)
//! ```

use super::error::BreakerError;
use crate::config::CircuitBreakerConfig;
use crate::events::{EventBus, RouterEvent};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the Prometheus gauge.
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Serializable view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub model_id: String,
    pub state: CircuitState,
    pub window_requests: usize,
    pub window_failures: usize,
    pub failure_rate: f64,
    pub half_open_in_flight: u32,
    pub half_open_successes: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// (completed_at, success) outcomes observed while Closed
    window: VecDeque<(Instant, bool)>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::new(),
            opened_at: None,
            half_open_in_flight: 0,
            half_open_successes: 0,
        }
    }

    fn failures(&self) -> usize {
        self.window.iter().filter(|(_, ok)| !ok).count()
    }

    fn prune(&mut self, now: Instant, window: std::time::Duration) {
        while let Some((at, _)) = self.window.front() {
            if now.duration_since(*at) > window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn enter(&mut self, state: CircuitState, now: Instant) {
        self.state = state;
        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
        match state {
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::Closed => {
                self.opened_at = None;
                self.window.clear();
            }
            CircuitState::HalfOpen => {}
        }
    }
}

/// Admission ticket returned by [`CircuitBreaker::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Normal call while Closed
    Normal,
    /// Probe call while Half-Open
    Probe,
}

/// An admitted call whose outcome is not recorded yet.
///
/// Dropping it unrecorded (the caller's future was cancelled) counts as a
/// failure, so a Half-Open probe slot is never leaked.
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    admission: Option<Admission>,
}

impl PendingCall<'_> {
    fn complete(mut self, success: bool) {
        if let Some(admission) = self.admission.take() {
            self.breaker.record(admission, success);
        }
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            self.breaker.record(admission, false);
        }
    }
}

/// Circuit breaker guarding calls to a single model.
#[derive(Debug)]
pub struct CircuitBreaker {
    model_id: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    events: Option<EventBus>,
}

type Transition = (CircuitState, CircuitState);

impl CircuitBreaker {
    pub fn new(model_id: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            model_id: model_id.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state, promoting Open to Half-Open if the recovery timeout passed.
    pub fn state(&self) -> CircuitState {
        let (state, transition) = {
            let mut inner = self.lock();
            let transition = self.maybe_half_open(&mut inner, Instant::now());
            (inner.state, transition)
        };
        self.publish(transition);
        state
    }

    fn maybe_half_open(&self, inner: &mut BreakerInner, now: Instant) -> Option<Transition> {
        if inner.state != CircuitState::Open {
            return None;
        }
        let opened_at = inner.opened_at?;
        if now.duration_since(opened_at) >= self.config.recovery_timeout() {
            inner.enter(CircuitState::HalfOpen, now);
            Some((CircuitState::Open, CircuitState::HalfOpen))
        } else {
            None
        }
    }

    /// Ask to run a call. Fails fast while Open or when Half-Open probes are exhausted.
    pub fn try_acquire(&self) -> Result<Admission, BreakerError<std::convert::Infallible>> {
        let (result, transition) = {
            let mut inner = self.lock();
            let transition = self.maybe_half_open(&mut inner, Instant::now());
            let result = match inner.state {
                CircuitState::Closed => Ok(Admission::Normal),
                CircuitState::Open => Err(BreakerError::Open),
                CircuitState::HalfOpen => {
                    if inner.half_open_in_flight < self.config.half_open_max_calls {
                        inner.half_open_in_flight += 1;
                        Ok(Admission::Probe)
                    } else {
                        Err(BreakerError::Open)
                    }
                }
            };
            (result, transition)
        };
        self.publish(transition);
        result
    }

    /// Record the outcome of a call admitted by [`try_acquire`](Self::try_acquire).
    pub fn record(&self, admission: Admission, success: bool) {
        let transition = {
            let mut inner = self.lock();
            let now = Instant::now();
            match (admission, inner.state) {
                (Admission::Probe, CircuitState::HalfOpen) => {
                    inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                    if success {
                        inner.half_open_successes += 1;
                        if inner.half_open_successes >= self.config.half_open_max_calls {
                            inner.enter(CircuitState::Closed, now);
                            Some((CircuitState::HalfOpen, CircuitState::Closed))
                        } else {
                            None
                        }
                    } else {
                        inner.enter(CircuitState::Open, now);
                        Some((CircuitState::HalfOpen, CircuitState::Open))
                    }
                }
                (Admission::Normal, CircuitState::Closed) => {
                    inner.window.push_back((now, success));
                    inner.prune(now, self.config.window());
                    let total = inner.window.len();
                    let failures = inner.failures();
                    if total >= self.config.minimum_requests as usize
                        && total > 0
                        && failures as f64 / total as f64 >= self.config.failure_threshold
                    {
                        inner.enter(CircuitState::Open, now);
                        Some((CircuitState::Closed, CircuitState::Open))
                    } else {
                        None
                    }
                }
                // The breaker moved on while this call was in flight; its
                // outcome belongs to a previous state.
                _ => None,
            }
        };
        self.publish(transition);
    }

    /// Run `f` under the breaker with the configured per-call timeout.
    ///
    /// Every `Err` from `f`, and every timeout, counts as a failure.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.guarded(f, Some(self.config.call_timeout())).await
    }

    /// Run `f` under the breaker without a timeout of its own.
    ///
    /// For callers that bound each attempt inside `f` themselves, such as a
    /// retry loop whose attempts each get the per-call timeout.
    pub async fn run<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.guarded(f, None).await
    }

    async fn guarded<T, E, F, Fut>(
        &self,
        f: F,
        timeout: Option<std::time::Duration>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.try_acquire().map_err(|_| BreakerError::Open)?;
        let pending = PendingCall {
            breaker: self,
            admission: Some(admission),
        };

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, f()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(
                        model_id = %self.model_id,
                        timeout_ms = limit.as_millis() as u64,
                        "Call exceeded circuit breaker timeout"
                    );
                    pending.complete(false);
                    return Err(BreakerError::Timeout(limit));
                }
            },
            None => f().await,
        };

        match outcome {
            Ok(value) => {
                pending.complete(true);
                Ok(value)
            }
            Err(e) => {
                pending.complete(false);
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Whether [`try_acquire`](Self::try_acquire) would fail right now: the
    /// breaker is Open, or Half-Open with all `half_open_max_calls` slots taken.
    pub fn is_rejecting(&self) -> bool {
        let (rejecting, transition) = {
            let mut inner = self.lock();
            let transition = self.maybe_half_open(&mut inner, Instant::now());
            let rejecting = match inner.state {
                CircuitState::Closed => false,
                CircuitState::Open => true,
                CircuitState::HalfOpen => {
                    inner.half_open_in_flight >= self.config.half_open_max_calls
                }
            };
            (rejecting, transition)
        };
        self.publish(transition);
        rejecting
    }

    /// Force the breaker closed and clear its counters.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.lock();
            let from = inner.state;
            inner.enter(CircuitState::Closed, Instant::now());
            (from != CircuitState::Closed).then_some((from, CircuitState::Closed))
        };
        self.publish(transition);
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.state();
        let inner = self.lock();
        let total = inner.window.len();
        let failures = inner.failures();
        CircuitBreakerSnapshot {
            model_id: self.model_id.clone(),
            state,
            window_requests: total,
            window_failures: failures,
            failure_rate: if total == 0 {
                0.0
            } else {
                failures as f64 / total as f64
            },
            half_open_in_flight: inner.half_open_in_flight,
            half_open_successes: inner.half_open_successes,
        }
    }

    fn publish(&self, transition: Option<Transition>) {
        let Some((from, to)) = transition else {
            return;
        };
        match to {
            CircuitState::Open => {
                tracing::warn!(model_id = %self.model_id, %from, %to, "Circuit breaker opened")
            }
            _ => tracing::info!(model_id = %self.model_id, %from, %to, "Circuit breaker state change"),
        }
        metrics::gauge!("arbiter_circuit_state", "model" => self.model_id.clone())
            .set(to.as_gauge());
        if let Some(events) = &self.events {
            events.emit(RouterEvent::CircuitBreakerStateChange {
                model_id: self.model_id.clone(),
                from,
                to,
                at: Utc::now(),
            });
        }
    }
}

/// Lazily-populated map of breakers, one per model.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
    events: Option<EventBus>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Breaker for `model_id`, created on first use.
    ///
    /// Creation goes through the map's entry lock, so concurrent first
    /// callers always share one instance.
    pub fn get_or_create(&self, model_id: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(model_id) {
            return Arc::clone(existing.value());
        }
        let entry = self.breakers.entry(model_id.to_string()).or_insert_with(|| {
            let mut breaker = CircuitBreaker::new(model_id, self.config.clone());
            if let Some(events) = &self.events {
                breaker = breaker.with_events(events.clone());
            }
            Arc::new(breaker)
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, model_id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(model_id).map(|b| Arc::clone(b.value()))
    }

    /// Whether the model's breaker would turn a call away right now: Open,
    /// or Half-Open with all `half_open_max_calls` slots in use.
    ///
    /// Models that have never been called have no breaker and are not rejecting.
    pub fn is_rejecting(&self, model_id: &str) -> bool {
        self.get(model_id).is_some_and(|b| b.is_rejecting())
    }

    /// Reset a model's breaker. Returns false if it was never created.
    pub fn reset(&self, model_id: &str) -> bool {
        match self.get(model_id) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Snapshots of every breaker sorted by model id.
    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| Arc::clone(e.value())).collect();
        let mut snapshots: Vec<_> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
