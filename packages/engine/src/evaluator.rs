//! Per-rule evaluation
//!
//! Evaluates one rule's condition against an evaluation context and
//! materializes its action text into a [`RuleOutcome`]. Evaluation is
//! fail-closed: a rule whose condition cannot be parsed or evaluated is
//! reported as not triggered with a diagnostic message, logged, and
//! never aborts the batch.
//!
//! # Parse cache
//!
//! Condition and action text are compiled once per rule and cached,
//! keyed by rule id with the SHA-256 of the source text stored
//! alongside. A cached entry is reused only while the hash matches, so
//! an updated rule recompiles on its next evaluation. The cache is a
//! `RwLock<HashMap>` with compute-on-miss; concurrent readers never
//! block each other.

use crate::context::EvaluationContext;
use crate::error::ParseError;
use crate::expr::{self, ActionTemplate, Expr};
use crate::rule::Rule;
use crate::types::{Confidence, RuleCategory};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Result of evaluating one rule against one context.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub rule_name: String,
    pub category: RuleCategory,
    /// Whether the condition held for this context
    pub triggered: bool,
    /// Action text with placeholders substituted; empty when the rule
    /// did not trigger
    pub materialized_action: String,
    pub priority: i32,
    pub confidence: Confidence,
    /// Human-readable summary when triggered, or the diagnostic when
    /// evaluation failed closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Follow-up guidance for recommendation-class rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Condition and action compiled into reusable form.
#[derive(Debug)]
struct CompiledRule {
    condition: Expr,
    action: ActionTemplate,
    /// SHA-256 over the source text; entry is stale when it differs
    content_hash: String,
}

fn content_hash(rule: &Rule) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule.condition.as_bytes());
    hasher.update([0u8]);
    hasher.update(rule.action.as_bytes());
    hex::encode(hasher.finalize())
}

/// Evaluates rules against contexts, caching compiled expressions.
#[derive(Debug, Default)]
pub struct RuleEvaluator {
    cache: RwLock<HashMap<String, Arc<CompiledRule>>>,
}

impl RuleEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached compiled rules.
    pub fn cached_rules(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Fetch the compiled form of a rule, compiling on miss or on
    /// content change.
    fn compile(&self, rule: &Rule) -> Result<Arc<CompiledRule>, ParseError> {
        let hash = content_hash(rule);

        if let Ok(cache) = self.cache.read() {
            if let Some(compiled) = cache.get(&rule.id) {
                if compiled.content_hash == hash {
                    return Ok(Arc::clone(compiled));
                }
            }
        }

        let compiled = Arc::new(CompiledRule {
            condition: expr::parse_condition(&rule.condition)?,
            action: expr::parse_action(&rule.action)?,
            content_hash: hash,
        });

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(rule.id.clone(), Arc::clone(&compiled));
        }

        Ok(compiled)
    }

    /// Evaluate a single rule against a context.
    ///
    /// Never fails: parse and evaluation errors produce a non-triggered
    /// outcome carrying the diagnostic in `message`.
    pub fn evaluate(&self, rule: &Rule, context: &EvaluationContext) -> RuleOutcome {
        let mut outcome = RuleOutcome {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            category: rule.category,
            triggered: false,
            materialized_action: String::new(),
            priority: rule.priority,
            confidence: rule.category.confidence(),
            message: None,
            recommendation: None,
        };

        let compiled = match self.compile(rule) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "Rule failed to compile; treated as not triggered");
                outcome.message = Some(format!("rule not evaluated: {e}"));
                return outcome;
            }
        };

        match compiled.condition.evaluate(context) {
            Ok(true) => {
                let action = compiled.action.render(context);
                outcome.triggered = true;
                outcome.message = Some(format!("[{}] {}", rule.name, action));
                if matches!(
                    rule.category,
                    RuleCategory::ReportingGuidance | RuleCategory::PhenotypeConfirmation
                ) {
                    outcome.recommendation = Some(action.clone());
                }
                outcome.materialized_action = action;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "Rule evaluation failed; treated as not triggered");
                outcome.message = Some(format!("rule not evaluated: {e}"));
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::sample_rule;
    use crate::types::{Interpretation, TestMethod};

    fn susceptible_context() -> EvaluationContext {
        EvaluationContext::new(
            "e_coli",
            "ampicillin",
            12.0,
            TestMethod::DiskDiffusion,
            Interpretation::Susceptible,
            2024,
        )
    }

    #[test]
    fn test_triggered_outcome() {
        let evaluator = RuleEvaluator::new();
        let rule = sample_rule("r1");

        let outcome = evaluator.evaluate(&rule, &susceptible_context());

        assert!(outcome.triggered);
        assert_eq!(outcome.rule_id, "r1");
        assert_eq!(outcome.materialized_action, "Report ampicillin as resistant");
        assert_eq!(outcome.confidence, Confidence::High);
        assert!(outcome.message.as_deref().unwrap().contains("rule r1"));
        // IntrinsicResistance is not a recommendation-class category
        assert!(outcome.recommendation.is_none());
    }

    #[test]
    fn test_not_triggered_outcome() {
        let evaluator = RuleEvaluator::new();
        let mut rule = sample_rule("r1");
        rule.condition = "testValue > 20".to_string();

        let outcome = evaluator.evaluate(&rule, &susceptible_context());

        assert!(!outcome.triggered);
        assert!(outcome.materialized_action.is_empty());
        assert!(outcome.message.is_none());
    }

    #[test]
    fn test_unknown_identifier_fails_closed() {
        let evaluator = RuleEvaluator::new();
        let mut rule = sample_rule("r1");
        rule.condition = "customFlag == \"true\"".to_string();

        let outcome = evaluator.evaluate(&rule, &susceptible_context());

        assert!(!outcome.triggered);
        let message = outcome.message.unwrap();
        assert!(message.contains("unknown identifier"));
        assert!(message.contains("customFlag"));
    }

    #[test]
    fn test_type_mismatch_fails_closed() {
        let evaluator = RuleEvaluator::new();
        let mut rule = sample_rule("r1");
        rule.condition = "testValue == \"twelve\"".to_string();

        let outcome = evaluator.evaluate(&rule, &susceptible_context());

        assert!(!outcome.triggered);
        assert!(outcome.message.unwrap().contains("type mismatch"));
    }

    #[test]
    fn test_malformed_condition_fails_closed() {
        let evaluator = RuleEvaluator::new();
        let mut rule = sample_rule("r1");
        rule.condition = "testValue <".to_string();

        let outcome = evaluator.evaluate(&rule, &susceptible_context());

        assert!(!outcome.triggered);
        assert!(outcome.message.unwrap().contains("parse error"));
    }

    #[test]
    fn test_recommendation_category_sets_recommendation() {
        let evaluator = RuleEvaluator::new();
        let mut rule = sample_rule("r1");
        rule.category = RuleCategory::ReportingGuidance;
        rule.condition = "year == 2024".to_string();
        rule.action = "Suppress {drugId} from the report".to_string();

        let outcome = evaluator.evaluate(&rule, &susceptible_context());

        assert!(outcome.triggered);
        assert_eq!(
            outcome.recommendation.as_deref(),
            Some("Suppress ampicillin from the report")
        );
        assert_eq!(outcome.confidence, Confidence::Low);
    }

    #[test]
    fn test_cache_reuses_compiled_rule() {
        let evaluator = RuleEvaluator::new();
        let rule = sample_rule("r1");
        let ctx = susceptible_context();

        let first = evaluator.evaluate(&rule, &ctx);
        let second = evaluator.evaluate(&rule, &ctx);

        assert_eq!(evaluator.cached_rules(), 1);
        assert_eq!(first.triggered, second.triggered);
        assert_eq!(first.materialized_action, second.materialized_action);
    }

    #[test]
    fn test_cache_recompiles_on_content_change() {
        let evaluator = RuleEvaluator::new();
        let mut rule = sample_rule("r1");

        assert!(evaluator.evaluate(&rule, &susceptible_context()).triggered);

        // Same id, different condition text: the stale entry must not be
        // reused
        rule.condition = "testValue > 100".to_string();
        let outcome = evaluator.evaluate(&rule, &susceptible_context());
        assert!(!outcome.triggered);
        assert_eq!(evaluator.cached_rules(), 1);
    }

    #[test]
    fn test_unresolved_action_placeholder_renders_verbatim() {
        let evaluator = RuleEvaluator::new();
        let mut rule = sample_rule("r1");
        rule.action = "Check {missingField} manually".to_string();

        let outcome = evaluator.evaluate(&rule, &susceptible_context());

        assert!(outcome.triggered);
        assert_eq!(outcome.materialized_action, "Check {missingField} manually");
    }
}
