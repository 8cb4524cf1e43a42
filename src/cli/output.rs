//! Output formatting helpers for CLI commands

use crate::config::{ModelEntry, DEFAULT_IMPORT_HEALTH};
use crate::registry::ModelStatus;
use crate::rules::{RoutingRule, RuleCondition};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for model display
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelView {
    pub id: String,
    pub provider: String,
    pub status: ModelStatus,
    pub capabilities: Vec<String>,
    pub endpoints: usize,
    pub health_score: f64,
}

impl From<&ModelEntry> for ModelView {
    fn from(entry: &ModelEntry) -> Self {
        Self {
            id: entry.id.clone(),
            provider: entry.provider.clone(),
            status: entry.status,
            capabilities: entry.capabilities.iter().cloned().collect(),
            endpoints: entry.endpoints.len(),
            health_score: entry.health_score.unwrap_or(DEFAULT_IMPORT_HEALTH),
        }
    }
}

/// View model for rule display
#[derive(Debug, Clone, serde::Serialize)]
pub struct RuleView {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub condition: String,
    pub targets: Vec<String>,
}

impl From<&RoutingRule> for RuleView {
    fn from(rule: &RoutingRule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            enabled: rule.enabled,
            priority: rule.priority,
            condition: describe_condition(&rule.condition),
            targets: rule
                .ordered_targets()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Compact one-line rendering of a rule condition, `*` when it matches everything.
pub fn describe_condition(condition: &RuleCondition) -> String {
    let mut parts = Vec::new();
    if let Some(agents) = condition.agent_types.as_ref().filter(|v| !v.is_empty()) {
        parts.push(format!("agent={}", agents.join("|")));
    }
    if let Some(workspaces) = condition.workspace_ids.as_ref().filter(|v| !v.is_empty()) {
        parts.push(format!("workspace={}", workspaces.join("|")));
    }
    if let Some(types) = condition.request_types.as_ref().filter(|v| !v.is_empty()) {
        let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
        parts.push(format!("type={}", names.join("|")));
    }
    if let Some(range) = condition.content_length {
        let min = range.min.map(|m| m.to_string()).unwrap_or_default();
        let max = range.max.map(|m| m.to_string()).unwrap_or_default();
        parts.push(format!("length={}..{}", min, max));
    }
    if let Some(window) = condition.time_of_day {
        parts.push(format!(
            "time={}-{}",
            window.start.format("%H:%M"),
            window.end.format("%H:%M")
        ));
    }
    if parts.is_empty() {
        "*".to_string()
    } else {
        parts.join(" ")
    }
}

/// Format models as a table
pub fn format_models_table(models: &[ModelView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Model",
        "Provider",
        "Status",
        "Capabilities",
        "Endpoints",
        "Health",
    ]);

    for m in models {
        let status_str = match m.status {
            ModelStatus::Active => "Active".green().to_string(),
            ModelStatus::Inactive => "Inactive".yellow().to_string(),
        };

        table.add_row(vec![
            Cell::new(&m.id),
            Cell::new(&m.provider),
            Cell::new(status_str),
            Cell::new(m.capabilities.join(", ")),
            Cell::new(m.endpoints),
            Cell::new(format!("{:.0}", m.health_score)),
        ]);
    }

    table.to_string()
}

/// Format models as JSON
pub fn format_models_json(models: &[ModelView]) -> String {
    serde_json::to_string_pretty(&json!({ "models": models })).unwrap_or_default()
}

/// Format rules as a table, in evaluation order
pub fn format_rules_table(rules: &[RuleView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Priority", "Rule", "Enabled", "Condition", "Targets"]);

    for r in rules {
        let enabled = if r.enabled {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        };

        table.add_row(vec![
            Cell::new(r.priority),
            Cell::new(format!("{} ({})", r.name, r.id)),
            Cell::new(enabled),
            Cell::new(&r.condition),
            Cell::new(r.targets.join(" → ")),
        ]);
    }

    table.to_string()
}

/// Format rules as JSON
pub fn format_rules_json(rules: &[RuleView]) -> String {
    serde_json::to_string_pretty(&json!({ "rules": rules })).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{LengthRange, TargetModel};
    use crate::types::RequestType;
    use chrono::Utc;

    fn model_view() -> ModelView {
        ModelView {
            id: "gpt-4".to_string(),
            provider: "openai".to_string(),
            status: ModelStatus::Active,
            capabilities: vec!["text-generation".to_string()],
            endpoints: 2,
            health_score: 87.4,
        }
    }

    fn rule() -> RoutingRule {
        let now = Utc::now();
        RoutingRule {
            id: "r1".to_string(),
            name: "Creative".to_string(),
            enabled: false,
            priority: 80,
            condition: RuleCondition {
                agent_types: Some(vec!["creative".to_string(), "writer".to_string()]),
                request_types: Some(vec![RequestType::Chat]),
                content_length: Some(LengthRange {
                    min: None,
                    max: Some(500),
                }),
                ..Default::default()
            },
            target_models: vec![
                TargetModel::new("gpt-4", 0.3),
                TargetModel::new("claude", 0.7),
            ],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_format_models_table_with_data() {
        let output = format_models_table(&[model_view()]);
        assert!(output.contains("gpt-4"));
        assert!(output.contains("Active"));
        assert!(output.contains("87"));
    }

    #[test]
    fn test_format_models_json_valid() {
        let output = format_models_json(&[model_view()]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["models"][0]["status"], "active");
    }

    #[test]
    fn test_describe_condition() {
        assert_eq!(describe_condition(&RuleCondition::default()), "*");
        assert_eq!(
            describe_condition(&rule().condition),
            "agent=creative|writer type=chat length=..500"
        );
    }

    #[test]
    fn test_rule_view_orders_targets_by_weight() {
        let view = RuleView::from(&rule());
        assert_eq!(view.targets, vec!["claude", "gpt-4"]);
        assert!(!view.enabled);
    }

    #[test]
    fn test_format_rules_table() {
        let output = format_rules_table(&[RuleView::from(&rule())]);
        assert!(output.contains("Priority"));
        assert!(output.contains("Creative (r1)"));
    }

    #[test]
    fn test_format_rules_json_valid() {
        let output = format_rules_json(&[RuleView::from(&rule())]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["rules"][0]["priority"], 80);
    }
}
