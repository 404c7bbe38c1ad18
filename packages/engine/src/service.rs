//! Service façade for expert rule validation and administration
//!
//! [`ExpertRuleService`] orchestrates selection, per-rule evaluation,
//! and aggregation, and exposes the administrative CRUD surface. It owns
//! the repository port and the evaluator's parse cache; everything else
//! is computed per call, so a shared service instance can serve
//! concurrent validation calls.
//!
//! # Failure policy
//!
//! `validate` either returns a complete verdict or a single explicit
//! error. Per-rule parse/evaluation failures are isolated (the rule is
//! reported as not triggered, with a diagnostic); repository failures
//! abort the call, since a partial candidate set would silently
//! under-enforce resistance rules.
//!
//! # Example
//!
//! ```ignore
//! use amr_rules_engine::{
//!     EvaluationContext, ExpertRuleService, Interpretation, TestMethod,
//! };
//!
//! let service = ExpertRuleService::in_memory();
//! service.load_rules_yaml(rules_yaml)?;
//!
//! let context = EvaluationContext::new(
//!     "e_coli", "ampicillin", 12.0,
//!     TestMethod::DiskDiffusion, Interpretation::Susceptible, 2024,
//! );
//! let verdict = service.validate(&context)?;
//! assert!(!verdict.is_valid);
//! ```

use crate::context::EvaluationContext;
use crate::error::{RepositoryError, Result};
use crate::evaluator::{RuleEvaluator, RuleOutcome};
use crate::repository::{InMemoryRuleRepository, RuleRepository};
use crate::rule::{Rule, RulePatch, RuleSet};
use crate::selector::select_rules;
use crate::types::RuleCategory;
use crate::verdict::{aggregate, ValidationVerdict};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Counts of stored rules by category, year, and active flag.
#[derive(Debug, Clone, Serialize)]
pub struct RuleStatistics {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_category: HashMap<RuleCategory, usize>,
    pub by_year: BTreeMap<i32, usize>,
}

/// Façade over the rule repository, selector, evaluator, and aggregator.
pub struct ExpertRuleService {
    repository: Box<dyn RuleRepository>,
    evaluator: RuleEvaluator,
}

impl ExpertRuleService {
    /// Create a service over an arbitrary repository implementation.
    pub fn new(repository: Box<dyn RuleRepository>) -> Self {
        Self {
            repository,
            evaluator: RuleEvaluator::new(),
        }
    }

    /// Create a service over an empty in-memory repository.
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryRuleRepository::new()))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate one test outcome against the applicable expert rules.
    ///
    /// Runs selector, evaluator (per rule), and aggregator. Returns a
    /// complete verdict, or an error if the repository failed.
    pub fn validate(&self, context: &EvaluationContext) -> Result<ValidationVerdict> {
        let candidates = select_rules(
            self.repository.as_ref(),
            &context.organism_id,
            &context.drug_id,
            context.year,
        )?;

        let outcomes: Vec<RuleOutcome> = candidates
            .iter()
            .map(|rule| self.evaluator.evaluate(rule, context))
            .collect();

        let verdict = aggregate(outcomes, context);

        tracing::debug!(
            organism_id = %context.organism_id,
            drug_id = %context.drug_id,
            candidates = candidates.len(),
            triggered = verdict.triggered_rules.len(),
            is_valid = verdict.is_valid,
            final_result = %verdict.final_result,
            "Validation complete"
        );

        Ok(verdict)
    }

    /// Evaluate a single rule against a context.
    ///
    /// Used internally by [`validate`](Self::validate) and exposed for
    /// rule authoring tools that want to dry-run one rule.
    pub fn evaluate_rule(&self, rule: &Rule, context: &EvaluationContext) -> RuleOutcome {
        self.evaluator.evaluate(rule, context)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Validate and store a new rule.
    pub fn create_rule(&self, rule: Rule) -> Result<Rule> {
        rule.validate()?;
        Ok(self.repository.save(rule)?)
    }

    /// Apply a field-level partial patch to an existing rule.
    ///
    /// Unspecified fields retain their prior values; `updated_at` is
    /// refreshed. The patched rule is re-validated before it is stored.
    pub fn update_rule(&self, id: &str, patch: RulePatch) -> Result<Rule> {
        let mut rule = self
            .repository
            .find_by_id(id)?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        rule.apply_patch(patch);
        rule.validate()?;
        Ok(self.repository.update(rule)?)
    }

    /// Flip a rule's active flag to false. One-way under normal
    /// operation; the rule stays retrievable by id for auditing.
    pub fn soft_delete_rule(&self, id: &str) -> Result<()> {
        Ok(self.repository.soft_delete(id)?)
    }

    /// Look up a rule by id, active or not.
    pub fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        Ok(self.repository.find_by_id(id)?)
    }

    /// All rules of a category, active or not.
    pub fn list_by_category(&self, category: RuleCategory) -> Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self
            .repository
            .find_all()?
            .into_iter()
            .filter(|r| r.category == category)
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    /// All rules for a standards year, active or not.
    pub fn list_by_year(&self, year: i32) -> Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self
            .repository
            .find_all()?
            .into_iter()
            .filter(|r| r.year == year)
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    /// Counts of stored rules by category, year, and active flag.
    pub fn statistics(&self) -> Result<RuleStatistics> {
        let rules = self.repository.find_all()?;

        let mut by_category: HashMap<RuleCategory, usize> = HashMap::new();
        let mut by_year: BTreeMap<i32, usize> = BTreeMap::new();
        let mut active = 0;

        for rule in &rules {
            *by_category.entry(rule.category).or_insert(0) += 1;
            *by_year.entry(rule.year).or_insert(0) += 1;
            if rule.is_active {
                active += 1;
            }
        }

        Ok(RuleStatistics {
            total: rules.len(),
            active,
            inactive: rules.len() - active,
            by_category,
            by_year,
        })
    }

    /// Parse a rule-set YAML document and store every rule it holds.
    ///
    /// Returns the number of rules loaded. The document is validated as
    /// a whole before anything is stored, so a malformed rule, a
    /// duplicated id, or a collision with an already stored rule rejects
    /// the entire load.
    pub fn load_rules_yaml(&self, yaml: &str) -> Result<usize> {
        let rule_set = RuleSet::from_yaml(yaml)?;
        for rule in &rule_set.rules {
            if self.repository.find_by_id(&rule.id)?.is_some() {
                return Err(RepositoryError::Duplicate(rule.id.clone()).into());
            }
        }
        let count = rule_set.rules.len();
        for rule in rule_set.rules {
            self.repository.save(rule)?;
        }
        tracing::debug!(rules = count, "Rule set loaded into repository");
        Ok(count)
    }
}
