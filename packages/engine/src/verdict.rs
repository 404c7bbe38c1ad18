//! Conflict resolution and verdict aggregation
//!
//! Turns the ordered list of rule outcomes into a [`ValidationVerdict`]:
//! classifies triggered rules into error/warning/recommendation buckets
//! and computes the final, possibly overridden, interpretation.
//!
//! # Classification
//!
//! | Category | Result was Susceptible | Otherwise |
//! |---|---|---|
//! | IntrinsicResistance, AcquiredResistance | error | warning |
//! | QualityControl | warning | warning |
//! | ReportingGuidance, PhenotypeConfirmation | recommendation | recommendation |
//!
//! # Override
//!
//! The override is one-directional: a triggered resistance rule flips a
//! Susceptible interpretation to Resistant, and nothing else. Rules
//! never downgrade a Resistant result, and Intermediate results are left
//! untouched.

use crate::context::EvaluationContext;
use crate::evaluator::RuleOutcome;
use crate::types::{Interpretation, RuleCategory};
use serde::Serialize;

/// The engine's verdict for one validation call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationVerdict {
    /// True iff no rule classified as an error fired
    pub is_valid: bool,
    /// Triggered rules in selector order (specificity, then priority)
    pub triggered_rules: Vec<RuleOutcome>,
    /// The context's interpretation, possibly overridden to Resistant
    pub final_result: Interpretation,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Aggregate evaluated outcomes into a verdict.
///
/// `outcomes` must arrive in selector order; only triggered outcomes are
/// kept, and their order is preserved (no re-sorting by category).
pub fn aggregate(outcomes: Vec<RuleOutcome>, context: &EvaluationContext) -> ValidationVerdict {
    let was_susceptible = context.interpreted_result == Interpretation::Susceptible;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();
    let mut override_to_resistant = false;

    let triggered_rules: Vec<RuleOutcome> =
        outcomes.into_iter().filter(|o| o.triggered).collect();

    for outcome in &triggered_rules {
        let message = outcome
            .message
            .clone()
            .unwrap_or_else(|| outcome.materialized_action.clone());

        match outcome.category {
            RuleCategory::IntrinsicResistance | RuleCategory::AcquiredResistance => {
                if was_susceptible {
                    errors.push(message);
                    override_to_resistant = true;
                } else {
                    warnings.push(message);
                }
            }
            RuleCategory::QualityControl => warnings.push(message),
            RuleCategory::ReportingGuidance | RuleCategory::PhenotypeConfirmation => {
                recommendations.push(outcome.recommendation.clone().unwrap_or(message));
            }
        }
    }

    let final_result = if override_to_resistant {
        Interpretation::Resistant
    } else {
        context.interpreted_result
    };

    ValidationVerdict {
        is_valid: errors.is_empty(),
        triggered_rules,
        final_result,
        errors,
        warnings,
        recommendations,
    }
}
