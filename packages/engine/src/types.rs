//! Core types for the expert rule engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents any scalar value visible to rule conditions and actions.
///
/// The evaluation context's open map carries scalars only, so unlike a
/// general JSON value there are no array or object variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null/None value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl Value {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get value as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get value as f64.
    ///
    /// Integers widen to f64 so that `Int(42)` and `Float(42.0)` compare
    /// equal under numeric operators.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get value as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if value is numeric (Int or Float)
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Human-readable type name, used in type-mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Laboratory method used to obtain the raw test value.
///
/// The canonical rule-language token for each method is its snake_case
/// name (e.g. `testMethod == "disk_diffusion"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    DiskDiffusion,
    BrothMicrodilution,
    AgarDilution,
    ETest,
    Automated,
    Molecular,
}

impl TestMethod {
    /// Canonical token as seen by rule conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMethod::DiskDiffusion => "disk_diffusion",
            TestMethod::BrothMicrodilution => "broth_microdilution",
            TestMethod::AgarDilution => "agar_dilution",
            TestMethod::ETest => "e_test",
            TestMethod::Automated => "automated",
            TestMethod::Molecular => "molecular",
        }
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpretation of a susceptibility test result after breakpoint lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interpretation {
    Susceptible,
    Intermediate,
    Resistant,
    NotTested,
    NotInterpretable,
}

impl Interpretation {
    /// Canonical token as seen by rule conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpretation::Susceptible => "Susceptible",
            Interpretation::Intermediate => "Intermediate",
            Interpretation::Resistant => "Resistant",
            Interpretation::NotTested => "NotTested",
            Interpretation::NotInterpretable => "NotInterpretable",
        }
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain category of an expert rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    IntrinsicResistance,
    AcquiredResistance,
    PhenotypeConfirmation,
    QualityControl,
    ReportingGuidance,
}

impl RuleCategory {
    /// Fixed confidence tier for rules of this category.
    pub fn confidence(&self) -> Confidence {
        match self {
            RuleCategory::IntrinsicResistance | RuleCategory::QualityControl => Confidence::High,
            RuleCategory::AcquiredResistance | RuleCategory::PhenotypeConfirmation => {
                Confidence::Medium
            }
            RuleCategory::ReportingGuidance => Confidence::Low,
        }
    }

    /// Whether this category asserts resistance (intrinsic or acquired).
    ///
    /// Resistance categories are the only ones that can override a
    /// Susceptible interpretation.
    pub fn is_resistance(&self) -> bool {
        matches!(
            self,
            RuleCategory::IntrinsicResistance | RuleCategory::AcquiredResistance
        )
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleCategory::IntrinsicResistance => "IntrinsicResistance",
            RuleCategory::AcquiredResistance => "AcquiredResistance",
            RuleCategory::PhenotypeConfirmation => "PhenotypeConfirmation",
            RuleCategory::QualityControl => "QualityControl",
            RuleCategory::ReportingGuidance => "ReportingGuidance",
        };
        f.write_str(name)
    }
}

/// Confidence tier attached to a rule outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Scope specificity of a rule, derived from its optional organism and
/// drug foreign keys.
///
/// Variants are ordered from least to most specific so that `Ord` gives
/// the tie-break ranking directly: pair-specific beats organism-only
/// beats drug-only beats global when priorities are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    Global,
    DrugOnly,
    OrganismOnly,
    Pair,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_primitives() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(3.14f64), Value::Float(3.14));
        assert_eq!(Value::from("test"), Value::String("test".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_value_as_methods() {
        let int_val = Value::Int(42);
        assert_eq!(int_val.as_number(), Some(42.0));
        assert_eq!(int_val.as_str(), None);
        assert!(int_val.is_number());

        let str_val = Value::String("hello".to_string());
        assert_eq!(str_val.as_str(), Some("hello"));
        assert_eq!(str_val.as_number(), None);

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Int(1).kind(), "number");
        assert_eq!(Value::Float(1.0).kind(), "number");
        assert_eq!(Value::String("x".into()).kind(), "string");
        assert_eq!(Value::Bool(false).kind(), "boolean");
        assert_eq!(Value::Null.kind(), "null");
    }

    #[test]
    fn test_test_method_tokens() {
        assert_eq!(TestMethod::DiskDiffusion.as_str(), "disk_diffusion");
        assert_eq!(
            TestMethod::BrothMicrodilution.as_str(),
            "broth_microdilution"
        );
        assert_eq!(TestMethod::ETest.as_str(), "e_test");
    }

    #[test]
    fn test_test_method_serde_roundtrip() {
        let json = serde_json::to_string(&TestMethod::DiskDiffusion).unwrap();
        assert_eq!(json, "\"disk_diffusion\"");
        let parsed: TestMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TestMethod::DiskDiffusion);
    }

    #[test]
    fn test_interpretation_tokens() {
        assert_eq!(Interpretation::Susceptible.as_str(), "Susceptible");
        assert_eq!(
            Interpretation::NotInterpretable.as_str(),
            "NotInterpretable"
        );
    }

    #[test]
    fn test_category_confidence_tiers() {
        assert_eq!(
            RuleCategory::IntrinsicResistance.confidence(),
            Confidence::High
        );
        assert_eq!(RuleCategory::QualityControl.confidence(), Confidence::High);
        assert_eq!(
            RuleCategory::AcquiredResistance.confidence(),
            Confidence::Medium
        );
        assert_eq!(
            RuleCategory::PhenotypeConfirmation.confidence(),
            Confidence::Medium
        );
        assert_eq!(
            RuleCategory::ReportingGuidance.confidence(),
            Confidence::Low
        );
    }

    #[test]
    fn test_specificity_ordering() {
        assert!(Specificity::Pair > Specificity::OrganismOnly);
        assert!(Specificity::OrganismOnly > Specificity::DrugOnly);
        assert!(Specificity::DrugOnly > Specificity::Global);
    }

    #[test]
    fn test_value_serde_roundtrip() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(42),
            Value::Float(3.14),
            Value::String("test".to_string()),
        ];

        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let parsed: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value, parsed);
        }
    }
}
