//! Configuration bundles: models, endpoints, preferences and rules imported
//! as one unit.

use crate::registry::{
    AgentPreferences, Endpoint, InMemoryRegistry, ModelMetadata, ModelStatus, RegistryError,
    WorkspaceConfig,
};
use crate::rules::{RuleDefinition, RuleEngine, RuleError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Health score given to imported models that do not declare one.
pub const DEFAULT_IMPORT_HEALTH: f64 = 100.0;

/// A model definition as written in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    /// Defaults to the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub provider: String,
    #[serde(default)]
    pub status: ModelStatus,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub agent_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
    #[serde(default)]
    pub input_cost_per_1k: f64,
    #[serde(default)]
    pub output_cost_per_1k: f64,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f64>,
}

impl ModelEntry {
    pub fn to_metadata(&self) -> ModelMetadata {
        ModelMetadata {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            provider: self.provider.clone(),
            status: self.status,
            capabilities: self.capabilities.clone(),
            agent_types: self.agent_types.clone(),
            context_length: self.context_length,
            input_cost_per_1k: self.input_cost_per_1k,
            output_cost_per_1k: self.output_cost_per_1k,
        }
    }
}

/// Everything the router needs to know besides its tuning knobs.
///
/// # Example
///
/// ```
/// use arbiter::config::ConfigBundle;
/// use arbiter::registry::InMemoryRegistry;
/// use arbiter::rules::RuleEngine;
///
/// let bundle: ConfigBundle = toml::from_str(r#"
///     [[models]]
///     id = "claude"
///     provider = "anthropic"
///     endpoints = [{ url = "http://localhost:9000/v1/generate" }]
///
///     [[rules]]
///     name = "everything-to-claude"
///     target_models = [{ model_id = "claude" }]
/// "#).unwrap();
///
/// let registry = InMemoryRegistry::new();
/// let rules = RuleEngine::new();
/// let summary = bundle.apply(&registry, &rules).unwrap();
/// assert_eq!(summary.models, 1);
/// assert_eq!(summary.rules, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigBundle {
    pub models: Vec<ModelEntry>,
    pub rules: Vec<RuleDefinition>,
    /// Preferences keyed by agent type
    pub agents: BTreeMap<String, AgentPreferences>,
    /// Restrictions keyed by workspace id
    pub workspaces: BTreeMap<String, WorkspaceConfig>,
}

/// Counts of what an import touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub models: usize,
    pub endpoints: usize,
    pub agents: usize,
    pub workspaces: usize,
    pub rules: usize,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImportError {
    #[error("Invalid rule: {0}")]
    Rule(#[from] RuleError),

    #[error("Invalid model: {0}")]
    Registry(#[from] RegistryError),

    #[error("Duplicate model id '{0}' in bundle")]
    DuplicateModel(String),
}

impl ConfigBundle {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
            && self.rules.is_empty()
            && self.agents.is_empty()
            && self.workspaces.is_empty()
    }

    /// Check rule definitions and model ids without touching any state.
    pub fn check(&self) -> Result<(), ImportError> {
        let mut seen = BTreeSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(ImportError::DuplicateModel(model.id.clone()));
            }
            if model.id.trim().is_empty() || model.provider.trim().is_empty() {
                return Err(RegistryError::InvalidModel(format!(
                    "model '{}' needs an id and a provider",
                    model.id
                ))
                .into());
            }
        }
        // Throwaway engine so duplicate rule ids are caught too
        RuleEngine::new().replace_all(self.rules.clone())?;
        Ok(())
    }

    /// Register models, endpoints, preferences and restrictions, then
    /// replace the rule set.
    ///
    /// Nothing is applied when any model or rule is invalid.
    pub fn apply(
        &self,
        registry: &InMemoryRegistry,
        rules: &RuleEngine,
    ) -> Result<ImportSummary, ImportError> {
        self.check()?;

        let mut summary = ImportSummary::default();
        for entry in &self.models {
            registry.upsert_model(entry.to_metadata())?;
            registry.set_endpoints(&entry.id, entry.endpoints.clone())?;
            registry.set_health(&entry.id, entry.health_score.unwrap_or(DEFAULT_IMPORT_HEALTH))?;
            summary.models += 1;
            summary.endpoints += entry.endpoints.len();
        }
        for (agent_type, preferences) in &self.agents {
            registry.set_agent_preferences(agent_type, preferences.clone());
            summary.agents += 1;
        }
        for (workspace_id, config) in &self.workspaces {
            registry.set_workspace_config(workspace_id, config.clone());
            summary.workspaces += 1;
        }
        summary.rules = rules.replace_all(self.rules.clone())?;

        tracing::info!(
            models = summary.models,
            endpoints = summary.endpoints,
            agents = summary.agents,
            workspaces = summary.workspaces,
            rules = summary.rules,
            "Configuration bundle imported"
        );
        Ok(summary)
    }
}
