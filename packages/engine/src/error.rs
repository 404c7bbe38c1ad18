//! Error types for the expert rule engine
//!
//! The taxonomy mirrors the propagation policy:
//! - [`ParseError`] — malformed condition or action text, detected at
//!   rule authoring/load time and surfaced to the rule author.
//! - [`EvalError`] — per-evaluation failures (unknown identifier, type
//!   mismatch). These fail closed: the offending rule is treated as not
//!   triggered and never aborts the batch.
//! - [`RepositoryError`] — storage-level failures. These abort the whole
//!   validation call, since a partial candidate rule set would silently
//!   under-enforce resistance rules.
//! - [`EngineError`] — umbrella type returned by the service façade.

use thiserror::Error;

/// Error produced while parsing a rule's condition or action text.
///
/// Names the offending token and its byte position so a rule author can
/// locate the problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at position {position} near '{token}': {message}")]
pub struct ParseError {
    /// Offending token text ("end of input" when the text ended early)
    pub token: String,
    /// Byte offset of the offending token in the source text
    pub position: usize,
    /// What the parser expected instead
    pub message: String,
}

impl ParseError {
    pub fn new(token: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            position,
            message: message.into(),
        }
    }
}

/// Error produced while evaluating a parsed expression against a context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Identifier not found in the fixed context fields or the open map
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// Operands of incompatible types, or an ordering operator applied
    /// to non-numeric operands
    #[error("type mismatch: cannot apply '{operator}' to {left} and {right}")]
    TypeMismatch {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },
}

/// Error propagated unchanged from the rule repository port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No rule with the given id exists
    #[error("rule not found: {0}")]
    NotFound(String),

    /// A rule with the given id already exists
    #[error("rule already exists: {0}")]
    Duplicate(String),

    /// The backing store is unreachable or failed mid-query
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed condition or action text
    #[error("rule parse error: {0}")]
    Parse(#[from] ParseError),

    /// Expression evaluation failure
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Storage-level failure from the repository port
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Failed to load or parse a rule set document
    #[error("failed to load rule set: {0}")]
    LoadError(String),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Rule failed structural validation (empty id, empty name, ...)
    #[error("invalid rule '{rule_id}': {reason}")]
    InvalidRule { rule_id: String, reason: String },
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
