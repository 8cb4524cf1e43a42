//! Routing rule engine
//!
//! Holds the configured [`RoutingRule`]s and answers which of them apply to a
//! request. Rules are stored as a copy-on-write snapshot: matching works on an
//! `Arc` of the rule list taken at the start of routing, so concurrent CRUD
//! never changes the rules a request is being evaluated against.

mod error;
mod rule;

pub use error::RuleError;
pub use rule::{
    LengthRange, RoutingRule, RuleCondition, RuleDefinition, RuleUpdate, TargetModel, TimeWindow,
};

use crate::types::ModelRequest;
use chrono::{NaiveTime, Utc};
use std::sync::{Arc, RwLock};

/// Thread-safe store and matcher for routing rules.
#[derive(Debug, Default)]
pub struct RuleEngine {
    /// Kept sorted by descending priority; equal priorities keep insertion order
    rules: RwLock<Arc<Vec<RoutingRule>>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine pre-loaded with rule definitions.
    pub fn with_rules(definitions: Vec<RuleDefinition>) -> Result<Self, RuleError> {
        let engine = Self::new();
        engine.replace_all(definitions)?;
        Ok(engine)
    }

    /// Current rule list. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Vec<RoutingRule>> {
        Arc::clone(&self.rules.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<RoutingRule>) -> Result<T, RuleError>,
    ) -> Result<T, RuleError> {
        let mut guard = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.as_ref().clone();
        let out = f(&mut next)?;
        next.sort_by(|a, b| b.priority.cmp(&a.priority));
        *guard = Arc::new(next);
        Ok(out)
    }

    /// Rules sorted by descending priority.
    pub fn list_rules(&self) -> Vec<RoutingRule> {
        self.snapshot().as_ref().clone()
    }

    pub fn get_rule(&self, id: &str) -> Option<RoutingRule> {
        self.snapshot().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Add a rule.
    ///
    /// # Errors
    ///
    /// `RuleError::Validation` for malformed definitions and
    /// `RuleError::Duplicate` if the id is already taken.
    pub fn add_rule(&self, definition: RuleDefinition) -> Result<RoutingRule, RuleError> {
        definition.validate()?;
        let rule = definition.into_rule(Utc::now());
        self.mutate(|rules| {
            if rules.iter().any(|r| r.id == rule.id) {
                return Err(RuleError::Duplicate(rule.id.clone()));
            }
            rules.push(rule.clone());
            Ok(())
        })?;
        tracing::info!(rule_id = %rule.id, name = %rule.name, priority = rule.priority, "Routing rule added");
        Ok(rule)
    }

    /// Apply a partial update and bump `updated_at`.
    pub fn update_rule(&self, id: &str, update: RuleUpdate) -> Result<RoutingRule, RuleError> {
        let updated = self.mutate(|rules| {
            let rule = rules
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| RuleError::NotFound(id.to_string()))?;
            update.apply(rule)?;
            rule.updated_at = Utc::now().max(rule.updated_at);
            Ok(rule.clone())
        })?;
        tracing::info!(rule_id = %id, "Routing rule updated");
        Ok(updated)
    }

    pub fn delete_rule(&self, id: &str) -> Result<RoutingRule, RuleError> {
        let removed = self.mutate(|rules| {
            let index = rules
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| RuleError::NotFound(id.to_string()))?;
            Ok(rules.remove(index))
        })?;
        tracing::info!(rule_id = %id, "Routing rule deleted");
        Ok(removed)
    }

    /// Atomically replace every rule. Nothing changes if any definition is
    /// invalid or ids collide.
    pub fn replace_all(&self, definitions: Vec<RuleDefinition>) -> Result<usize, RuleError> {
        let now = Utc::now();
        let mut next = Vec::with_capacity(definitions.len());
        for definition in definitions {
            definition.validate()?;
            let rule = definition.into_rule(now);
            if next.iter().any(|r: &RoutingRule| r.id == rule.id) {
                return Err(RuleError::Duplicate(rule.id));
            }
            next.push(rule);
        }
        let count = next.len();
        self.mutate(|rules| {
            *rules = next;
            Ok(())
        })?;
        Ok(count)
    }

    /// Enabled rules matching the request right now, highest priority first.
    pub fn find_matching_rules(&self, request: &ModelRequest) -> Vec<RoutingRule> {
        self.find_matching_rules_at(request, Utc::now().time())
    }

    /// Same as [`find_matching_rules`](Self::find_matching_rules) at an explicit UTC time of day.
    pub fn find_matching_rules_at(
        &self,
        request: &ModelRequest,
        now: NaiveTime,
    ) -> Vec<RoutingRule> {
        matching_rules(&self.snapshot(), request, now)
    }
}

/// Filter a rule snapshot down to the rules matching a request.
///
/// The snapshot is expected in descending priority order, as produced by
/// [`RuleEngine::snapshot`].
pub fn matching_rules(
    rules: &[RoutingRule],
    request: &ModelRequest,
    now: NaiveTime,
) -> Vec<RoutingRule> {
    rules
        .iter()
        .filter(|rule| rule.matches(request, now))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestType;

    fn def(id: &str, priority: i32, agents: Option<Vec<&str>>, targets: &[&str]) -> RuleDefinition {
        RuleDefinition {
            id: Some(id.to_string()),
            name: id.to_string(),
            enabled: true,
            priority,
            condition: RuleCondition {
                agent_types: agents.map(|a| a.into_iter().map(String::from).collect()),
                ..Default::default()
            },
            target_models: targets.iter().map(|t| TargetModel::new(*t, 1.0)).collect(),
        }
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn matching_rules_sorted_by_priority() {
        let engine = RuleEngine::new();
        engine.add_rule(def("default", 10, None, &["llama"])).unwrap();
        engine
            .add_rule(def("creative", 80, Some(vec!["creative"]), &["claude", "gpt4"]))
            .unwrap();
        engine.add_rule(def("mid", 50, None, &["gpt4"])).unwrap();

        let request = ModelRequest::new("creative", "ws", "hello", RequestType::Chat);
        let ids: Vec<String> = engine
            .find_matching_rules_at(&request, noon())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["creative", "mid", "default"]);

        let other = ModelRequest::new("analyst", "ws", "hello", RequestType::Chat);
        let ids: Vec<String> = engine
            .find_matching_rules_at(&other, noon())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["mid", "default"]);
    }

    #[test]
    fn equal_priority_keeps_insertion_order() {
        let engine = RuleEngine::new();
        engine.add_rule(def("first", 5, None, &["a"])).unwrap();
        engine.add_rule(def("second", 5, None, &["b"])).unwrap();
        let request = ModelRequest::new("x", "ws", "p", RequestType::Chat);
        let ids: Vec<String> = engine
            .find_matching_rules_at(&request, noon())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let engine = RuleEngine::new();
        engine.add_rule(def("r1", 1, None, &["a"])).unwrap();
        assert_eq!(
            engine.add_rule(def("r1", 2, None, &["b"])),
            Err(RuleError::Duplicate("r1".to_string()))
        );
    }

    #[test]
    fn generated_id_when_missing() {
        let engine = RuleEngine::new();
        let mut definition = def("x", 1, None, &["a"]);
        definition.id = None;
        let rule = engine.add_rule(definition).unwrap();
        assert_eq!(rule.id.len(), 36);
    }

    #[test]
    fn update_bumps_updated_at_and_resorts() {
        let engine = RuleEngine::new();
        let original = engine.add_rule(def("low", 1, None, &["a"])).unwrap();
        engine.add_rule(def("high", 50, None, &["b"])).unwrap();

        let updated = engine
            .update_rule(
                "low",
                RuleUpdate {
                    priority: Some(100),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(engine.list_rules()[0].id, "low");
    }

    #[test]
    fn update_and_delete_unknown_rule() {
        let engine = RuleEngine::new();
        assert_eq!(
            engine.update_rule("nope", RuleUpdate::default()),
            Err(RuleError::NotFound("nope".to_string()))
        );
        assert_eq!(
            engine.delete_rule("nope"),
            Err(RuleError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn delete_removes_rule() {
        let engine = RuleEngine::new();
        engine.add_rule(def("r1", 1, None, &["a"])).unwrap();
        engine.delete_rule("r1").unwrap();
        assert!(engine.is_empty());
        assert!(engine.get_rule("r1").is_none());
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutations() {
        let engine = RuleEngine::new();
        engine.add_rule(def("r1", 1, None, &["a"])).unwrap();
        let snapshot = engine.snapshot();

        engine.delete_rule("r1").unwrap();
        engine.add_rule(def("r2", 1, None, &["b"])).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "r1");
    }

    #[test]
    fn replace_all_is_atomic_on_error() {
        let engine = RuleEngine::new();
        engine.add_rule(def("keep", 1, None, &["a"])).unwrap();

        let result = engine.replace_all(vec![
            def("new", 1, None, &["a"]),
            def("bad", 1, None, &[]),
        ]);
        assert!(result.is_err());
        assert_eq!(engine.list_rules()[0].id, "keep");

        let result = engine.replace_all(vec![def("dup", 1, None, &["a"]), def("dup", 2, None, &["b"])]);
        assert_eq!(result, Err(RuleError::Duplicate("dup".to_string())));

        assert_eq!(engine.replace_all(vec![def("new", 1, None, &["a"])]), Ok(1));
        assert_eq!(engine.list_rules()[0].id, "new");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Matched rules are always enabled and ordered by non-increasing priority.
            #[test]
            fn prop_matches_are_enabled_and_ordered(
                priorities in proptest::collection::vec((-100i32..100, any::<bool>()), 0..20)
            ) {
                let engine = RuleEngine::new();
                for (i, (priority, enabled)) in priorities.iter().enumerate() {
                    let mut d = def(&format!("r{}", i), *priority, None, &["m"]);
                    d.enabled = *enabled;
                    engine.add_rule(d).unwrap();
                }
                let request = ModelRequest::new("a", "w", "p", RequestType::Chat);
                let matched = engine.find_matching_rules_at(&request, noon());

                prop_assert_eq!(
                    matched.len(),
                    priorities.iter().filter(|(_, enabled)| *enabled).count()
                );
                prop_assert!(matched.iter().all(|r| r.enabled));
                prop_assert!(matched.windows(2).all(|w| w[0].priority >= w[1].priority));
            }
        }
    }
}
