use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether a model may receive new traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// Model is accepting requests
    #[default]
    Active,
    /// Model is registered but must not be routed to
    Inactive,
}

/// A model known to the registry.
///
/// The router only reads these; ownership stays with the registry.
///
/// # Examples
///
/// ```
/// use arbiter::registry::ModelMetadata;
///
/// let model = ModelMetadata::new("claude-3", "anthropic")
///     .with_capabilities(["text-generation", "text-analysis"]);
/// assert!(model.has_capability("text-analysis"));
/// assert!(model.is_active());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Unique model identifier (e.g., "claude-3-opus")
    pub id: String,
    /// Human-readable model name
    pub name: String,
    /// Provider name, also the bulkhead pool key (e.g., "openai")
    pub provider: String,
    #[serde(default)]
    pub status: ModelStatus,
    /// Capability tags such as `text-generation` or `embeddings`
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Agent types this model serves; empty means every agent type
    #[serde(default)]
    pub agent_types: Vec<String>,
    /// Maximum context window in tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
    /// Price per 1K prompt tokens in USD
    #[serde(default)]
    pub input_cost_per_1k: f64,
    /// Price per 1K completion tokens in USD
    #[serde(default)]
    pub output_cost_per_1k: f64,
}

impl ModelMetadata {
    /// Create an active model with no capabilities. The name defaults to the id.
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            status: ModelStatus::Active,
            capabilities: BTreeSet::new(),
            agent_types: Vec::new(),
            context_length: None,
            input_cost_per_1k: 0.0,
            output_cost_per_1k: 0.0,
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_agent_types<I, S>(mut self, agent_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_types = agent_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: ModelStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ModelStatus::Active
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Whether this model is assigned to the given agent type.
    pub fn serves_agent(&self, agent_type: &str) -> bool {
        self.agent_types.is_empty() || self.agent_types.iter().any(|a| a == agent_type)
    }

    /// Cost in USD for the given token counts.
    pub fn cost_for(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.input_cost_per_1k
            + (completion_tokens as f64 / 1000.0) * self.output_cost_per_1k
    }
}

/// A network location serving a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    /// Static share of traffic relative to sibling endpoints
    #[serde(default = "default_endpoint_weight")]
    pub weight: u32,
}

fn default_endpoint_weight() -> u32 {
    1
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            weight: default_endpoint_weight(),
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

/// Registry-reported health of a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelHealth {
    /// 0-100, higher is healthier
    pub health_score: f64,
}

/// Per-workspace routing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Model ids this workspace may not use
    #[serde(default)]
    pub model_restrictions: Vec<String>,
}

/// Ordered model preferences of an agent type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentPreferences {
    #[serde(default)]
    pub preferred_models: Vec<String>,
    #[serde(default)]
    pub fallback_models: Vec<String>,
}
