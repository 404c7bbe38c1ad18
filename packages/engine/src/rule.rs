//! Expert rule model and YAML rule-set loading
//!
//! Rules are authored as YAML documents (a [`RuleSet`] with a list of
//! rules) and held in a repository. Loading enforces the limits from
//! [`crate::config`] and validates every rule's condition and action
//! text, so malformed expressions are reported to the author instead of
//! surfacing later during validation.

use crate::config;
use crate::error::{EngineError, Result};
use crate::expr;
use crate::types::{RuleCategory, Specificity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An expert rule.
///
/// Scope is derived from the two optional foreign keys: both set means
/// pair-specific, one set means organism- or drug-general, neither set
/// means global. A rule is immutable after creation except through an
/// explicit update or soft-delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Opaque identifier, unique within the repository
    pub id: String,
    /// Short human-readable name
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Domain category, drives classification and confidence
    pub category: RuleCategory,
    /// Condition expression source text
    pub condition: String,
    /// Action template source text
    pub action: String,
    /// Higher priority evaluates and wins first
    #[serde(default)]
    pub priority: i32,
    /// Standards year the rule applies to
    pub year: i32,
    /// Organism scope; `None` means any organism
    #[serde(default)]
    pub organism_id: Option<String>,
    /// Drug scope; `None` means any drug
    #[serde(default)]
    pub drug_id: Option<String>,
    /// Literature or standards reference backing the rule
    #[serde(default)]
    pub source_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Soft-delete flag; inactive rules are invisible to evaluation
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Rule {
    /// Scope specificity derived from the organism/drug foreign keys.
    pub fn specificity(&self) -> Specificity {
        match (&self.organism_id, &self.drug_id) {
            (Some(_), Some(_)) => Specificity::Pair,
            (Some(_), None) => Specificity::OrganismOnly,
            (None, Some(_)) => Specificity::DrugOnly,
            (None, None) => Specificity::Global,
        }
    }

    /// Structural validation plus a parse of both expression texts.
    ///
    /// Called on create, update, and rule-set load so that a rule with
    /// malformed condition or action text never reaches the repository.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidRule {
                rule_id: self.id.clone(),
                reason: "rule id must not be empty".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidRule {
                rule_id: self.id.clone(),
                reason: "rule name must not be empty".to_string(),
            });
        }

        expr::parse_condition(&self.condition).map_err(|e| EngineError::InvalidRule {
            rule_id: self.id.clone(),
            reason: format!("condition: {e}"),
        })?;
        expr::parse_action(&self.action).map_err(|e| EngineError::InvalidRule {
            rule_id: self.id.clone(),
            reason: format!("action: {e}"),
        })?;

        Ok(())
    }

    /// Apply a field-level partial patch; unspecified fields retain
    /// their prior values. Refreshes `updated_at`.
    pub fn apply_patch(&mut self, patch: RulePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(condition) = patch.condition {
            self.condition = condition;
        }
        if let Some(action) = patch.action {
            self.action = action;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(organism_id) = patch.organism_id {
            self.organism_id = organism_id;
        }
        if let Some(drug_id) = patch.drug_id {
            self.drug_id = drug_id;
        }
        if let Some(source_reference) = patch.source_reference {
            self.source_reference = source_reference;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

/// Field-level partial update for a rule.
///
/// `None` leaves the field untouched; the nested `Option` on the scope
/// and annotation fields distinguishes "leave as is" from "clear".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub category: Option<RuleCategory>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub organism_id: Option<Option<String>>,
    #[serde(default)]
    pub drug_id: Option<Option<String>>,
    #[serde(default)]
    pub source_reference: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A YAML rule-set document: optional metadata plus a list of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Display name of the rule set (e.g. "EUCAST expert rules 2024")
    #[serde(default)]
    pub name: Option<String>,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Parse a rule-set YAML document, enforcing size limits,
    /// validating every rule, and rejecting duplicated rule ids.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.len() > config::MAX_YAML_SIZE {
            return Err(EngineError::LoadError(format!(
                "rule set document too large: {} bytes (max {})",
                yaml.len(),
                config::MAX_YAML_SIZE
            )));
        }

        let rule_set: RuleSet = serde_yaml_ng::from_str(yaml)?;

        if rule_set.rules.len() > config::MAX_LOADED_RULES {
            return Err(EngineError::LoadError(format!(
                "rule set holds {} rules (max {})",
                rule_set.rules.len(),
                config::MAX_LOADED_RULES
            )));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for rule in &rule_set.rules {
            rule.validate()?;
            if !seen.insert(&rule.id) {
                return Err(EngineError::LoadError(format!(
                    "duplicate rule id '{}' in rule set",
                    rule.id
                )));
            }
        }

        tracing::debug!(
            name = rule_set.name.as_deref().unwrap_or("<unnamed>"),
            rules = rule_set.rules.len(),
            "Parsed rule set"
        );

        Ok(rule_set)
    }
}

/// Pair-specific IntrinsicResistance fixture shared by unit tests.
#[cfg(test)]
pub(crate) fn sample_rule(id: &str) -> Rule {
    Rule {
        id: id.to_string(),
        name: format!("rule {id}"),
        description: None,
        category: RuleCategory::IntrinsicResistance,
        condition: "interpretedResult == \"Susceptible\" && testValue < 14".to_string(),
        action: "Report {drugId} as resistant".to_string(),
        priority: 10,
        year: 2024,
        organism_id: Some("e_coli".to_string()),
        drug_id: Some("ampicillin".to_string()),
        source_reference: None,
        notes: None,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
