//! Model scoring for candidate selection
//!
//! A candidate's score is the sum of:
//!
//! | Component   | Points                                              |
//! |-------------|-----------------------------------------------------|
//! | preference  | `1000 - 100*i` at preferred index i, `500 - 50*j` at fallback index j |
//! | health      | 0-100 health score                                  |
//! | priority    | +200 critical, +100 high                            |
//! | capability  | +50 if the model has the request type's capability  |
//!
//! Ties keep input order.

use super::error::RoutingError;
use crate::registry::{AgentPreferences, ModelMetadata, WorkspaceConfig};
use crate::types::{ModelRequest, RequestPriority};
use serde::Serialize;
use std::collections::HashMap;

/// Point values for each scoring component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub preferred_base: f64,
    pub preferred_step: f64,
    pub fallback_base: f64,
    pub fallback_step: f64,
    pub critical_boost: f64,
    pub high_boost: f64,
    pub capability_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            preferred_base: 1000.0,
            preferred_step: 100.0,
            fallback_base: 500.0,
            fallback_step: 50.0,
            critical_boost: 200.0,
            high_boost: 100.0,
            capability_bonus: 50.0,
        }
    }
}

/// Everything besides the request and candidates that scoring looks at.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub preferences: Option<AgentPreferences>,
    pub workspace: Option<WorkspaceConfig>,
    /// Model id to 0-100 health; missing models score 0
    pub health: HashMap<String, f64>,
}

/// Per-component score of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub model_id: String,
    pub preference: f64,
    pub health: f64,
    pub priority: f64,
    pub capability: f64,
    pub total: f64,
}

/// Deterministic scorer over a candidate list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelScorer {
    weights: ScoringWeights,
}

impl ModelScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score_model(
        &self,
        request: &ModelRequest,
        model: &ModelMetadata,
        context: &ScoringContext,
    ) -> ScoreBreakdown {
        let w = &self.weights;

        let mut preference = 0.0;
        if let Some(prefs) = &context.preferences {
            if let Some(i) = prefs.preferred_models.iter().position(|m| *m == model.id) {
                preference += w.preferred_base - w.preferred_step * i as f64;
            }
            if let Some(j) = prefs.fallback_models.iter().position(|m| *m == model.id) {
                preference += w.fallback_base - w.fallback_step * j as f64;
            }
        }

        let health = context
            .health
            .get(&model.id)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);

        let priority = match request.priority {
            RequestPriority::Critical => w.critical_boost,
            RequestPriority::High => w.high_boost,
            RequestPriority::Normal => 0.0,
        };

        let capability = if model.has_capability(request.request_type.required_capability()) {
            w.capability_bonus
        } else {
            0.0
        };

        ScoreBreakdown {
            model_id: model.id.clone(),
            preference,
            health,
            priority,
            capability,
            total: preference + health + priority + capability,
        }
    }

    /// Score every candidate left after workspace filtering, best first.
    pub fn rank(
        &self,
        request: &ModelRequest,
        candidates: &[ModelMetadata],
        context: &ScoringContext,
    ) -> Vec<ScoreBreakdown> {
        let allowed = apply_workspace_restrictions(candidates, context.workspace.as_ref());
        let mut scored: Vec<ScoreBreakdown> = allowed
            .into_iter()
            .map(|m| self.score_model(request, m, context))
            .collect();
        // sort_by is stable: equal totals keep candidate order
        scored.sort_by(|a, b| b.total.total_cmp(&a.total));
        scored
    }

    /// Pick the highest scoring candidate.
    ///
    /// # Errors
    ///
    /// `RoutingError::NoModelAvailable` when `candidates` is empty.
    pub fn select_best_model(
        &self,
        request: &ModelRequest,
        candidates: &[ModelMetadata],
        context: &ScoringContext,
    ) -> Result<ModelMetadata, RoutingError> {
        let ranked = self.rank(request, candidates, context);
        let best = ranked.first().ok_or_else(|| RoutingError::NoModelAvailable {
            reason: format!(
                "no candidate models for agent type '{}'",
                request.agent_type
            ),
        })?;

        tracing::debug!(
            request_id = %request.id,
            model_id = %best.model_id,
            score = best.total,
            candidates = ranked.len(),
            "Model selected by score"
        );

        candidates
            .iter()
            .find(|m| m.id == best.model_id)
            .cloned()
            .ok_or_else(|| RoutingError::NoModelAvailable {
                reason: format!("scored model '{}' vanished from candidates", best.model_id),
            })
    }
}

/// Drop models the workspace disallows, unless that would drop all of them.
pub fn apply_workspace_restrictions<'a>(
    candidates: &'a [ModelMetadata],
    workspace: Option<&WorkspaceConfig>,
) -> Vec<&'a ModelMetadata> {
    let Some(workspace) = workspace.filter(|w| !w.model_restrictions.is_empty()) else {
        return candidates.iter().collect();
    };
    let allowed: Vec<&ModelMetadata> = candidates
        .iter()
        .filter(|m| !workspace.model_restrictions.contains(&m.id))
        .collect();
    if allowed.is_empty() {
        tracing::warn!(
            restricted = ?workspace.model_restrictions,
            "Workspace restrictions exclude every candidate, ignoring them"
        );
        candidates.iter().collect()
    } else {
        allowed
    }
}
