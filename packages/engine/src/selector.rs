//! Candidate rule selection
//!
//! Gathers the candidate rule set for an evaluation context by unioning
//! the four scope buckets from the repository, deduplicating by rule id,
//! dropping inactive rules, and ordering the result. Repository failures
//! propagate to the caller: validating against a partial candidate set
//! would silently under-enforce resistance rules.
//!
//! # Ordering
//!
//! Specificity rank descending (pair > organism-only > drug-only >
//! global), then priority descending, then rule id ascending as a
//! deterministic tie-break.

use crate::error::RepositoryError;
use crate::repository::RuleRepository;
use crate::rule::Rule;
use std::cmp::Reverse;
use std::collections::HashSet;

/// Select and order the active candidate rules for an
/// organism/drug/year triple.
pub fn select_rules(
    repository: &dyn RuleRepository,
    organism_id: &str,
    drug_id: &str,
    year: i32,
) -> Result<Vec<Rule>, RepositoryError> {
    let mut candidates: Vec<Rule> = Vec::new();
    // Dedupe by id: a rule must not be double-counted if a data error
    // makes it match more than one bucket
    let mut seen: HashSet<String> = HashSet::new();

    let buckets = [
        repository.find_rules_by_pair(organism_id, drug_id, year)?,
        repository.find_rules_by_organism(organism_id)?,
        repository.find_rules_by_drug(drug_id)?,
        repository.find_global_rules_by_year(year)?,
    ];

    for bucket in buckets {
        for rule in bucket {
            if rule.is_active && seen.insert(rule.id.clone()) {
                candidates.push(rule);
            }
        }
    }

    candidates.sort_by(|a, b| {
        (Reverse(a.specificity()), Reverse(a.priority), &a.id).cmp(&(
            Reverse(b.specificity()),
            Reverse(b.priority),
            &b.id,
        ))
    });

    tracing::debug!(
        organism_id = %organism_id,
        drug_id = %drug_id,
        year = year,
        candidates = candidates.len(),
        "Selected candidate rules"
    );

    Ok(candidates)
}
