//! Model Registry module.
//!
//! The router treats the registry as an external collaborator and only reads
//! from it through the [`ModelRegistry`] trait. [`InMemoryRegistry`] is the
//! thread-safe store used by the server binary and by tests.

mod error;
mod model;

pub use error::*;
pub use model::*;

use async_trait::async_trait;
use dashmap::DashMap;

/// Read-only view of the model registry consumed by the router.
#[async_trait]
pub trait ModelRegistry: Send + Sync + 'static {
    /// Look up a single model.
    async fn get_model(&self, id: &str) -> Result<Option<ModelMetadata>, RegistryError>;

    /// All active models assigned to an agent type.
    async fn get_active_models_for_agent(
        &self,
        agent_type: &str,
    ) -> Result<Vec<ModelMetadata>, RegistryError>;

    /// Current health of a model, if the registry tracks one.
    async fn get_model_health(&self, id: &str) -> Result<Option<ModelHealth>, RegistryError>;

    /// Endpoints that can serve a model.
    async fn get_model_endpoints(&self, id: &str) -> Result<Vec<Endpoint>, RegistryError>;

    async fn get_workspace_config(
        &self,
        workspace_id: &str,
    ) -> Result<Option<WorkspaceConfig>, RegistryError>;

    async fn get_agent_preferences(
        &self,
        agent_type: &str,
    ) -> Result<Option<AgentPreferences>, RegistryError>;

    /// Every registered model regardless of status.
    async fn list_models(&self) -> Result<Vec<ModelMetadata>, RegistryError>;
}

/// Thread-safe in-memory registry.
///
/// Uses concurrent maps (DashMap) so reads from many routing tasks never
/// contend on a global lock.
///
/// # Examples
///
/// ```
/// use arbiter::registry::{InMemoryRegistry, ModelMetadata};
///
/// let registry = InMemoryRegistry::new();
/// registry.upsert_model(ModelMetadata::new("gpt-4", "openai")).unwrap();
/// assert_eq!(registry.model_count(), 1);
/// ```
pub struct InMemoryRegistry {
    models: DashMap<String, ModelMetadata>,
    health: DashMap<String, ModelHealth>,
    endpoints: DashMap<String, Vec<Endpoint>>,
    workspaces: DashMap<String, WorkspaceConfig>,
    agents: DashMap<String, AgentPreferences>,
}

impl InMemoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
            health: DashMap::new(),
            endpoints: DashMap::new(),
            workspaces: DashMap::new(),
            agents: DashMap::new(),
        }
    }

    /// Insert or replace a model definition.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidModel` if the id or provider is empty.
    pub fn upsert_model(&self, model: ModelMetadata) -> Result<(), RegistryError> {
        if model.id.trim().is_empty() {
            return Err(RegistryError::InvalidModel("model id cannot be empty".to_string()));
        }
        if model.provider.trim().is_empty() {
            return Err(RegistryError::InvalidModel(format!(
                "model '{}' has no provider",
                model.id
            )));
        }
        self.models.insert(model.id.clone(), model);
        Ok(())
    }

    /// Remove a model together with its health and endpoints.
    pub fn remove_model(&self, id: &str) -> Result<ModelMetadata, RegistryError> {
        let model = self
            .models
            .remove(id)
            .map(|(_, model)| model)
            .ok_or_else(|| RegistryError::ModelNotFound(id.to_string()))?;
        self.health.remove(id);
        self.endpoints.remove(id);
        Ok(model)
    }

    pub fn set_status(&self, id: &str, status: ModelStatus) -> Result<(), RegistryError> {
        let mut model = self
            .models
            .get_mut(id)
            .ok_or_else(|| RegistryError::ModelNotFound(id.to_string()))?;
        model.status = status;
        Ok(())
    }

    /// Record the health score of a model, clamped to 0-100.
    pub fn set_health(&self, id: &str, health_score: f64) -> Result<(), RegistryError> {
        if !self.models.contains_key(id) {
            return Err(RegistryError::ModelNotFound(id.to_string()));
        }
        self.health.insert(
            id.to_string(),
            ModelHealth {
                health_score: health_score.clamp(0.0, 100.0),
            },
        );
        Ok(())
    }

    pub fn set_endpoints(&self, id: &str, endpoints: Vec<Endpoint>) -> Result<(), RegistryError> {
        if !self.models.contains_key(id) {
            return Err(RegistryError::ModelNotFound(id.to_string()));
        }
        self.endpoints.insert(id.to_string(), endpoints);
        Ok(())
    }

    pub fn set_workspace_config(&self, workspace_id: &str, config: WorkspaceConfig) {
        self.workspaces.insert(workspace_id.to_string(), config);
    }

    pub fn set_agent_preferences(&self, agent_type: &str, preferences: AgentPreferences) {
        self.agents.insert(agent_type.to_string(), preferences);
    }

    /// Number of registered models.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Registered models sorted by id.
    pub fn models(&self) -> Vec<ModelMetadata> {
        let mut models: Vec<ModelMetadata> =
            self.models.iter().map(|entry| entry.value().clone()).collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryRegistry {
    async fn get_model(&self, id: &str) -> Result<Option<ModelMetadata>, RegistryError> {
        Ok(self.models.get(id).map(|entry| entry.value().clone()))
    }

    async fn get_active_models_for_agent(
        &self,
        agent_type: &str,
    ) -> Result<Vec<ModelMetadata>, RegistryError> {
        Ok(self
            .models()
            .into_iter()
            .filter(|m| m.is_active() && m.serves_agent(agent_type))
            .collect())
    }

    async fn get_model_health(&self, id: &str) -> Result<Option<ModelHealth>, RegistryError> {
        Ok(self.health.get(id).map(|entry| *entry.value()))
    }

    async fn get_model_endpoints(&self, id: &str) -> Result<Vec<Endpoint>, RegistryError> {
        Ok(self
            .endpoints
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn get_workspace_config(
        &self,
        workspace_id: &str,
    ) -> Result<Option<WorkspaceConfig>, RegistryError> {
        Ok(self.workspaces.get(workspace_id).map(|entry| entry.value().clone()))
    }

    async fn get_agent_preferences(
        &self,
        agent_type: &str,
    ) -> Result<Option<AgentPreferences>, RegistryError> {
        Ok(self.agents.get(agent_type).map(|entry| entry.value().clone()))
    }

    async fn list_models(&self) -> Result<Vec<ModelMetadata>, RegistryError> {
        Ok(self.models())
    }
}
