//! Routing rule definitions and condition matching.

use super::error::RuleError;
use crate::types::{ModelRequest, RequestType};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive prompt-length bounds in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LengthRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

impl LengthRange {
    pub fn contains(&self, len: usize) -> bool {
        self.min.map_or(true, |min| len >= min) && self.max.map_or(true, |max| len <= max)
    }
}

/// Half-open UTC time-of-day window `[start, end)`.
///
/// A window whose start is after its end wraps past midnight, so
/// `22:00-06:00` matches late evening and early morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "clock_time")]
    pub start: NaiveTime,
    #[serde(with = "clock_time")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            now >= self.start && now < self.end
        } else {
            now >= self.start || now < self.end
        }
    }
}

/// Conditions a request must satisfy for a rule to apply.
///
/// Every present field must match. Absent fields, and empty lists, match
/// anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_types: Option<Vec<RequestType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<LengthRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeWindow>,
}

fn set_matches<T: PartialEq>(set: &Option<Vec<T>>, value: &T) -> bool {
    match set {
        Some(values) if !values.is_empty() => values.contains(value),
        _ => true,
    }
}

impl RuleCondition {
    /// Evaluate against a request at the given UTC time of day.
    pub fn matches(&self, request: &ModelRequest, now: NaiveTime) -> bool {
        set_matches(&self.agent_types, &request.agent_type)
            && set_matches(&self.workspace_ids, &request.workspace_id)
            && set_matches(&self.request_types, &request.request_type)
            && self
                .content_length
                .map_or(true, |range| range.contains(request.content_length()))
            && self.time_of_day.map_or(true, |window| window.contains(now))
    }

    fn validate(&self) -> Result<(), RuleError> {
        if let Some(LengthRange {
            min: Some(min),
            max: Some(max),
        }) = self.content_length
        {
            if min > max {
                return Err(RuleError::validation(
                    "condition.content_length",
                    format!("min ({}) is greater than max ({})", min, max),
                ));
            }
        }
        if let Some(window) = self.time_of_day {
            if window.start == window.end {
                return Err(RuleError::validation(
                    "condition.time_of_day",
                    "start and end must differ",
                ));
            }
        }
        Ok(())
    }
}

/// A model a rule routes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetModel {
    pub model_id: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Lower values are tried first
    #[serde(default)]
    pub fallback_order: u32,
}

fn default_weight() -> f64 {
    1.0
}

impl TargetModel {
    pub fn new(model_id: impl Into<String>, weight: f64) -> Self {
        Self {
            model_id: model_id.into(),
            weight,
            fallback_order: 0,
        }
    }
}

/// A configured routing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Higher values are evaluated first
    pub priority: i32,
    pub condition: RuleCondition,
    pub target_models: Vec<TargetModel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutingRule {
    pub fn matches(&self, request: &ModelRequest, now: NaiveTime) -> bool {
        self.enabled && self.condition.matches(request, now)
    }

    /// Target model ids by ascending fallback order, then descending weight.
    pub fn ordered_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&TargetModel> = self.target_models.iter().collect();
        targets.sort_by(|a, b| {
            a.fallback_order.cmp(&b.fallback_order).then(
                b.weight
                    .partial_cmp(&a.weight)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        targets.into_iter().map(|t| t.model_id.as_str()).collect()
    }
}

/// Input for creating a rule. A missing id is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub condition: RuleCondition,
    pub target_models: Vec<TargetModel>,
}

fn default_enabled() -> bool {
    true
}

impl RuleDefinition {
    pub(crate) fn validate(&self) -> Result<(), RuleError> {
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(RuleError::validation("id", "cannot be empty"));
            }
        }
        if self.name.trim().is_empty() {
            return Err(RuleError::validation("name", "cannot be empty"));
        }
        validate_targets(&self.target_models)?;
        self.condition.validate()
    }

    pub(crate) fn into_rule(self, now: DateTime<Utc>) -> RoutingRule {
        RoutingRule {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: self.name,
            enabled: self.enabled,
            priority: self.priority,
            condition: self.condition,
            target_models: self.target_models,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an existing rule. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RuleCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_models: Option<Vec<TargetModel>>,
}

impl RuleUpdate {
    pub(crate) fn apply(self, rule: &mut RoutingRule) -> Result<(), RuleError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(RuleError::validation("name", "cannot be empty"));
            }
        }
        if let Some(targets) = &self.target_models {
            validate_targets(targets)?;
        }
        if let Some(condition) = &self.condition {
            condition.validate()?;
        }

        if let Some(name) = self.name {
            rule.name = name;
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
        if let Some(priority) = self.priority {
            rule.priority = priority;
        }
        if let Some(condition) = self.condition {
            rule.condition = condition;
        }
        if let Some(targets) = self.target_models {
            rule.target_models = targets;
        }
        Ok(())
    }
}

fn validate_targets(targets: &[TargetModel]) -> Result<(), RuleError> {
    if targets.is_empty() {
        return Err(RuleError::validation(
            "target_models",
            "at least one target model is required",
        ));
    }
    for (i, target) in targets.iter().enumerate() {
        if target.model_id.trim().is_empty() {
            return Err(RuleError::validation(
                &format!("target_models[{}].model_id", i),
                "cannot be empty",
            ));
        }
        if !target.weight.is_finite() || target.weight < 0.0 {
            return Err(RuleError::validation(
                &format!("target_models[{}].weight", i),
                "must be a non-negative number",
            ));
        }
    }
    Ok(())
}

/// Serde adapter for `HH:MM` / `HH:MM:SS` clock times.
mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}
