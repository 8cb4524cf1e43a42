//! Configuration module for Arbiter
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`ARBITER_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use arbiter::config::ArbiterConfig;
//!
//! // Load defaults
//! let config = ArbiterConfig::default();
//! assert_eq!(config.server.port, 8100);
//!
//! // Parse from TOML
//! let toml = r#"
//! [server]
//! port = 9000
//! "#;
//! let config: ArbiterConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.port, 9000);
//! ```

pub mod bundle;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod resilience;
pub mod routing;
pub mod server;

pub use bundle::{ConfigBundle, ImportError, ImportSummary, ModelEntry, DEFAULT_IMPORT_HEALTH};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use metrics::{MetricsConfig, ProviderConfig};
pub use resilience::{
    BulkheadConfig, CircuitBreakerConfig, IdempotencyConfig, RetryConfig, DEFAULT_POOL,
};
pub use routing::{RoutingConfig, RoutingWeights};
pub use server::ServerConfig;

// Re-export EndpointHealthConfig from health module
pub use crate::health::{EndpointHealthConfig, SelectionStrategy};

use crate::registry::{AgentPreferences, WorkspaceConfig};
use crate::rules::RuleDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Unified configuration for the Arbiter server.
///
/// Tuning sections first, then the bundle sections (`[[models]]`,
/// `[[rules]]`, `[agents.*]`, `[workspaces.*]`) that are imported into the
/// registry and rule engine at startup.
///
/// # Example
///
/// ```rust
/// use arbiter::config::ArbiterConfig;
///
/// let config = ArbiterConfig::default();
/// assert_eq!(config.server.port, 8100);
/// assert_eq!(config.server.host, "0.0.0.0");
/// assert_eq!(config.retry.max_retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArbiterConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Scoring weights and request deadline
    pub routing: RoutingConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub bulkhead: BulkheadConfig,
    pub idempotency: IdempotencyConfig,
    pub endpoint_health: EndpointHealthConfig,
    pub metrics: MetricsConfig,
    pub provider: ProviderConfig,
    /// Models with their endpoints and initial health
    pub models: Vec<ModelEntry>,
    /// Routing rules
    pub rules: Vec<RuleDefinition>,
    /// Agent preferences keyed by agent type
    pub agents: BTreeMap<String, AgentPreferences>,
    /// Workspace restrictions keyed by workspace id
    pub workspaces: BTreeMap<String, WorkspaceConfig>,
}

impl ArbiterConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports ARBITER_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("ARBITER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("ARBITER_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("ARBITER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ARBITER_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// The `[[models]]`, `[[rules]]`, `[agents]` and `[workspaces]` sections.
    pub fn bundle(&self) -> ConfigBundle {
        ConfigBundle {
            models: self.models.clone(),
            rules: self.rules.clone(),
            agents: self.agents.clone(),
            workspaces: self.workspaces.clone(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "port must be non-zero",
            ));
        }

        let breaker = &self.circuit_breaker;
        if !(breaker.failure_threshold > 0.0 && breaker.failure_threshold <= 1.0) {
            return Err(ConfigError::validation(
                "circuit_breaker.failure_threshold",
                "must be in (0.0, 1.0]",
            ));
        }
        if breaker.minimum_requests == 0 || breaker.half_open_max_calls == 0 {
            return Err(ConfigError::validation(
                "circuit_breaker",
                "minimum_requests and half_open_max_calls must be at least 1",
            ));
        }
        if breaker.call_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "circuit_breaker.call_timeout_ms",
                "must be non-zero",
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::validation(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_ratio) {
            return Err(ConfigError::validation(
                "retry.jitter_ratio",
                "must be in [0.0, 1.0]",
            ));
        }

        for (pool, capacity) in &self.bulkhead.pools {
            if *capacity == 0 {
                return Err(ConfigError::validation(
                    format!("bulkhead.pools.{}", pool),
                    "capacity must be at least 1",
                ));
            }
        }

        let alpha = self.endpoint_health.ema_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::validation(
                "endpoint_health.ema_alpha",
                "must be in (0.0, 1.0]",
            ));
        }

        if self.metrics.window_capacity == 0 {
            return Err(ConfigError::validation(
                "metrics.window_capacity",
                "must be at least 1",
            ));
        }

        let mut model_ids = BTreeSet::new();
        for (i, model) in self.models.iter().enumerate() {
            if model.id.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("models[{}].id", i),
                    "id cannot be empty",
                ));
            }
            if model.provider.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("models[{}].provider", i),
                    "provider cannot be empty",
                ));
            }
            if !model_ids.insert(model.id.as_str()) {
                return Err(ConfigError::validation(
                    format!("models[{}].id", i),
                    format!("duplicate model id '{}'", model.id),
                ));
            }
            for (j, endpoint) in model.endpoints.iter().enumerate() {
                if endpoint.url.trim().is_empty() {
                    return Err(ConfigError::validation(
                        format!("models[{}].endpoints[{}].url", i, j),
                        "URL cannot be empty",
                    ));
                }
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            let label = rule.id.clone().unwrap_or_else(|| format!("rules[{}]", i));
            rule.validate().map_err(|source| ConfigError::Rule {
                rule: label.clone(),
                source,
            })?;
            for target in &rule.target_models {
                if !model_ids.contains(target.model_id.as_str()) {
                    return Err(ConfigError::validation(
                        format!("rules[{}].target_models", i),
                        format!(
                            "rule '{}' targets undeclared model '{}'",
                            label, target.model_id
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}
