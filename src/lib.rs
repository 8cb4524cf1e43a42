//! Arbiter - Rule-driven router for AI model requests
//!
//! This library selects a model for each request (canary override, routing
//! rules, then weighted scoring) and executes the call through a resilience
//! pipeline of idempotency, bulkheads, circuit breakers and retries.

pub mod api;
pub mod cli;
pub mod config;
pub mod events;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod routing;
pub mod rules;
pub mod types;
