//! Endpoint health tracking and selection.
//!
//! Every provider call reports its latency and outcome here. The recorded
//! history drives two things: which endpoint of a model the next attempt
//! goes to, and the model-level health score the scorer falls back on when
//! the registry has none.

mod config;
mod state;


pub use config::{EndpointHealthConfig, SelectionStrategy};
pub use state::{EndpointHealthRecord, EndpointState, EndpointStatus, ROLLING_WINDOW};

use crate::registry::Endpoint;
use dashmap::DashMap;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Chooses endpoints for a model and records how they behave.
#[derive(Debug, Default)]
pub struct EndpointHealthSelector {
    config: EndpointHealthConfig,
    /// Keyed by endpoint URL
    endpoints: DashMap<String, EndpointState>,
    /// Model id to the URLs it has been served from
    model_endpoints: DashMap<String, BTreeSet<String>>,
    /// Round-robin cursor per model
    cursors: DashMap<String, AtomicUsize>,
}

impl EndpointHealthSelector {
    pub fn new(config: EndpointHealthConfig) -> Self {
        Self {
            config,
            endpoints: DashMap::new(),
            model_endpoints: DashMap::new(),
            cursors: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EndpointHealthConfig {
        &self.config
    }

    fn track(&self, model_id: &str, endpoint: &Endpoint) {
        self.endpoints
            .entry(endpoint.url.clone())
            .and_modify(|s| s.weight = endpoint.weight)
            .or_insert_with(|| EndpointState::new(endpoint.weight));
        self.model_endpoints
            .entry(model_id.to_string())
            .or_default()
            .insert(endpoint.url.clone());
    }

    /// Pick an endpoint for `model_id` out of `endpoints`.
    ///
    /// Endpoints flagged unhealthy are skipped until their cooldown passes.
    /// If every endpoint is flagged the whole list is used instead, so a
    /// model with endpoints always gets one. Returns `None` only for an
    /// empty list.
    pub fn select_endpoint(&self, model_id: &str, endpoints: &[Endpoint]) -> Option<Endpoint> {
        if endpoints.is_empty() {
            return None;
        }
        for endpoint in endpoints {
            self.track(model_id, endpoint);
        }

        let now = Instant::now();
        let cooldown = self.config.cooldown();
        let healthy: Vec<&Endpoint> = endpoints
            .iter()
            .filter(|e| {
                self.endpoints
                    .get(&e.url)
                    .map_or(true, |s| s.is_selectable(cooldown, now))
            })
            .collect();

        let pool: Vec<&Endpoint> = if healthy.is_empty() {
            tracing::warn!(
                model_id,
                endpoints = endpoints.len(),
                "All endpoints flagged unhealthy, selecting among all"
            );
            endpoints.iter().collect()
        } else {
            healthy
        };

        let chosen = match self.config.strategy {
            SelectionStrategy::RoundRobin => self.pick_round_robin(model_id, &pool),
            SelectionStrategy::WeightedRandom => self.pick_weighted(&pool),
        };
        tracing::debug!(model_id, url = %chosen.url, strategy = %self.config.strategy, "Endpoint selected");
        Some(chosen.clone())
    }

    fn pick_round_robin<'a>(&self, model_id: &str, pool: &[&'a Endpoint]) -> &'a Endpoint {
        let index = {
            let cursor = self
                .cursors
                .entry(model_id.to_string())
                .or_insert_with(|| AtomicUsize::new(0));
            cursor.fetch_add(1, Ordering::Relaxed)
        };
        pool[index % pool.len()]
    }

    /// Weight is the configured weight scaled by the endpoint's health score.
    fn pick_weighted<'a>(&self, pool: &[&'a Endpoint]) -> &'a Endpoint {
        let weights: Vec<f64> = pool
            .iter()
            .map(|e| {
                let score = self
                    .endpoints
                    .get(&e.url)
                    .map_or(100.0, |s| s.health_score(&self.config));
                e.weight as f64 * score.max(1.0) / 100.0
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return pool[0];
        }

        let mut point = rand::thread_rng().gen_range(0.0..total);
        for (endpoint, weight) in pool.iter().zip(&weights) {
            if point < *weight {
                return endpoint;
            }
            point -= weight;
        }
        pool[pool.len() - 1]
    }

    /// Record the outcome of a call made to `url` on behalf of `model_id`.
    pub fn record_result(&self, model_id: &str, url: &str, latency: Duration, success: bool) {
        let transition = {
            let mut state = self
                .endpoints
                .entry(url.to_string())
                .or_insert_with(|| EndpointState::new(1));
            state.apply_result(latency, success, &self.config, Instant::now())
        };
        self.model_endpoints
            .entry(model_id.to_string())
            .or_default()
            .insert(url.to_string());

        match transition {
            Some(EndpointStatus::Unhealthy) => tracing::warn!(
                model_id,
                url,
                failure_threshold = self.config.failure_threshold,
                "Endpoint flagged unhealthy"
            ),
            Some(EndpointStatus::Healthy) => {
                tracing::info!(model_id, url, "Endpoint recovered")
            }
            None => {}
        }
    }

    /// Mean health score over the endpoints that have served `model_id`.
    ///
    /// `None` until the model has at least one recorded endpoint.
    pub fn model_health_score(&self, model_id: &str) -> Option<f64> {
        let urls: Vec<String> = self
            .model_endpoints
            .get(model_id)?
            .iter()
            .cloned()
            .collect();
        let scores: Vec<f64> = urls
            .iter()
            .filter_map(|url| self.endpoints.get(url).map(|s| s.health_score(&self.config)))
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    pub fn endpoint_status(&self, url: &str) -> Option<EndpointStatus> {
        self.endpoints.get(url).map(|s| s.status)
    }

    /// Records for every known endpoint, sorted by URL.
    pub fn endpoint_records(&self) -> Vec<EndpointHealthRecord> {
        let mut records: Vec<EndpointHealthRecord> = self
            .endpoints
            .iter()
            .map(|entry| {
                let url = entry.key().clone();
                let state = entry.value();
                EndpointHealthRecord {
                    model_ids: Vec::new(),
                    weight: state.weight,
                    status: state.status,
                    ema_latency_ms: state.ema_latency_ms,
                    successes: state.successes(),
                    failures: state.failures(),
                    consecutive_failures: state.consecutive_failures,
                    health_score: state.health_score(&self.config),
                    url,
                }
            })
            .collect();

        for record in &mut records {
            record.model_ids = self
                .model_endpoints
                .iter()
                .filter(|m| m.value().contains(&record.url))
                .map(|m| m.key().clone())
                .collect();
            record.model_ids.sort();
        }
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }
}
