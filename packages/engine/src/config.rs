//! Configuration constants for the expert rule engine
//!
//! Centralized limits used throughout the engine for:
//! - Security limits (prevent DoS via hostile rule documents)
//! - Resource constraints (memory)
//! - Recursion depth limits (prevent stack overflow)
//!
//! # Customization
//!
//! Currently these are compile-time constants. Future versions may
//! support runtime configuration via environment variables or a
//! configuration file.

/// Maximum number of rules that can be held in the in-memory repository.
///
/// Prevents memory exhaustion from loading too many rules. The published
/// EUCAST/CLSI expert rule sets are in the low hundreds per standards
/// year, so 10,000 leaves ample headroom.
pub const MAX_LOADED_RULES: usize = 10_000;

/// Maximum rule set YAML document size in bytes (1 MB).
///
/// Prevents YAML bomb attacks and excessive memory usage during parsing.
/// A full year's rule set serializes to well under 100 KB.
pub const MAX_YAML_SIZE: usize = 1_000_000;

/// Maximum length in bytes of a single condition or action text.
///
/// Observed expert rule conditions are one to three comparisons; 4 KB is
/// far beyond any legitimate rule.
pub const MAX_EXPRESSION_LENGTH: usize = 4_096;

/// Maximum nesting depth of parenthesized expressions.
///
/// Prevents stack overflow in the recursive-descent parser and the
/// expression evaluator on input like "((((((...". Real rules nest at
/// most two or three levels.
pub const MAX_EXPRESSION_DEPTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_reasonable() {
        // Sanity checks that limits are within reasonable bounds
        assert!(MAX_LOADED_RULES >= 1_000, "Should allow a full rule set");
        assert!(MAX_LOADED_RULES <= 100_000, "Should not allow excessive rules");

        assert!(MAX_YAML_SIZE >= 100_000, "Should allow at least 100KB");
        assert!(MAX_YAML_SIZE <= 10_000_000, "Should not allow 10MB+");

        assert!(MAX_EXPRESSION_LENGTH >= 256, "Should allow real conditions");
        assert!(MAX_EXPRESSION_LENGTH <= 65_536, "Should limit huge conditions");

        assert!(MAX_EXPRESSION_DEPTH >= 8, "Should allow reasonable nesting");
        assert!(MAX_EXPRESSION_DEPTH <= 128, "Should limit deep nesting");
    }
}
