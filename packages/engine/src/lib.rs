//! AMR Rules Engine
//!
//! Expert rule evaluation for antimicrobial susceptibility test results.
//! Given a test outcome that has already been interpreted against a
//! breakpoint standard, this library decides whether domain expert rules
//! should override, flag, or annotate that interpretation:
//! - Parsing rule conditions and action templates into a typed AST
//!   (no dynamic code execution)
//! - Selecting applicable rules by organism/drug scope and standards year
//! - Evaluating each rule fail-closed against an immutable context
//! - Aggregating triggered rules into a structured validation verdict
//!
//! # Example
//!
//! ```ignore
//! use amr_rules_engine::{
//!     EvaluationContext, ExpertRuleService, Interpretation, TestMethod,
//! };
//!
//! let service = ExpertRuleService::in_memory();
//! service.load_rules_yaml(&std::fs::read_to_string("rules/eucast_2024.yaml")?)?;
//!
//! let context = EvaluationContext::new(
//!     "e_coli", "ampicillin", 12.0,
//!     TestMethod::DiskDiffusion, Interpretation::Susceptible, 2024,
//! );
//!
//! let verdict = service.validate(&context)?;
//! println!("valid: {}, final: {}", verdict.is_valid, verdict.final_result);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod repository;
pub mod rule;
pub mod selector;
pub mod service;
pub mod types;
pub mod verdict;

// Re-export commonly used items
pub use context::EvaluationContext;
pub use error::{EngineError, EvalError, ParseError, RepositoryError, Result};
pub use evaluator::{RuleEvaluator, RuleOutcome};
pub use expr::{parse_action, parse_condition, ActionTemplate, Expr, ValueResolver};
pub use repository::{InMemoryRuleRepository, RepoResult, RuleRepository};
pub use rule::{Rule, RulePatch, RuleSet};
pub use selector::select_rules;
pub use service::{ExpertRuleService, RuleStatistics};
pub use types::{
    Confidence, Interpretation, RuleCategory, Specificity, TestMethod, Value,
};
pub use verdict::ValidationVerdict;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
