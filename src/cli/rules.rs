//! Rules command implementation

use crate::cli::output::{format_rules_json, format_rules_table, RuleView};
use crate::cli::RulesArgs;
use crate::config::ArbiterConfig;
use crate::rules::RuleEngine;

/// Handle `arbiter rules`
///
/// Rules are loaded through a [`RuleEngine`] so the listing shows the same
/// evaluation order the server would use, and invalid rules are reported.
pub fn handle_rules(
    args: &RulesArgs,
    config: &ArbiterConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let engine = RuleEngine::new();
    engine.replace_all(config.rules.clone())?;

    let rules: Vec<RuleView> = engine
        .list_rules()
        .iter()
        .filter(|r| !args.enabled_only || r.enabled)
        .map(RuleView::from)
        .collect();

    if args.json {
        Ok(format_rules_json(&rules))
    } else {
        Ok(format_rules_table(&rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> ArbiterConfig {
        toml::from_str(
            r#"
            [[rules]]
            id = "low"
            name = "Default"
            priority = 10
            target_models = [{ model_id = "gpt-4" }]

            [[rules]]
            id = "high"
            name = "Creative"
            priority = 80
            enabled = false
            condition = { agent_types = ["creative"] }
            target_models = [{ model_id = "claude-3" }]
            "#,
        )
        .unwrap()
    }

    fn args(enabled_only: bool) -> RulesArgs {
        RulesArgs {
            json: true,
            enabled_only,
            config: PathBuf::from("arbiter.toml"),
        }
    }

    #[test]
    fn test_rules_listed_by_priority() {
        let output = handle_rules(&args(false), &config()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let ids: Vec<&str> = parsed["rules"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[test]
    fn test_rules_enabled_only() {
        let output = handle_rules(&args(true), &config()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["rules"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["rules"][0]["id"], "low");
    }

    #[test]
    fn test_rules_invalid_definition_errors() {
        let mut config = config();
        config.rules[0].target_models.clear();
        assert!(handle_rules(&args(false), &config).is_err());
    }
}
