//! Evaluation context for rule conditions
//!
//! An [`EvaluationContext`] is an immutable snapshot of the test outcome
//! being validated. One is built per validation call and discarded
//! afterwards; nothing in the engine mutates or caches it.
//!
//! # Resolution Priority
//!
//! Rule-language identifiers are resolved in the following order (first
//! match wins):
//! 1. **Fixed fields** — `organismId`, `drugId`, `testValue`,
//!    `testMethod`, `interpretedResult`, `year`
//! 2. **Open map** — additional scalar values supplied by the caller,
//!    referenced by their exact key
//!
//! Fixed fields shadow open-map entries of the same name so that rule
//! semantics cannot be changed by injecting a colliding key.

use crate::expr::ValueResolver;
use crate::types::{Interpretation, TestMethod, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable typed record describing one susceptibility test outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Organism identifier (e.g. "e_coli")
    pub organism_id: String,
    /// Drug identifier (e.g. "ampicillin")
    pub drug_id: String,
    /// Raw numeric test value (zone diameter in mm, or MIC in mg/L)
    pub test_value: f64,
    /// Method that produced the test value
    pub test_method: TestMethod,
    /// Interpretation assigned by breakpoint lookup
    pub interpreted_result: Interpretation,
    /// Standards year the interpretation was made against
    pub year: i32,
    /// Additional named scalar values rule authors may reference
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl EvaluationContext {
    /// Create a context with an empty open map.
    pub fn new(
        organism_id: impl Into<String>,
        drug_id: impl Into<String>,
        test_value: f64,
        test_method: TestMethod,
        interpreted_result: Interpretation,
        year: i32,
    ) -> Self {
        Self {
            organism_id: organism_id.into(),
            drug_id: drug_id.into(),
            test_value,
            test_method,
            interpreted_result,
            year,
            extra: HashMap::new(),
        }
    }

    /// Add an open-map entry, consuming and returning the context.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl ValueResolver for EvaluationContext {
    fn resolve(&self, name: &str) -> Option<Value> {
        // Fixed fields first, then the open map
        match name {
            "organismId" => Some(Value::String(self.organism_id.clone())),
            "drugId" => Some(Value::String(self.drug_id.clone())),
            "testValue" => Some(Value::Float(self.test_value)),
            "testMethod" => Some(Value::String(self.test_method.as_str().to_string())),
            "interpretedResult" => {
                Some(Value::String(self.interpreted_result.as_str().to_string()))
            }
            "year" => Some(Value::Int(self.year as i64)),
            _ => self.extra.get(name).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> EvaluationContext {
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
    fn test_fixed_field_resolution() {
        let ctx = sample_context();
        assert_eq!(ctx.resolve("organismId"), Some(Value::from("e_coli")));
        assert_eq!(ctx.resolve("drugId"), Some(Value::from("ampicillin")));
        assert_eq!(ctx.resolve("testValue"), Some(Value::Float(12.0)));
        assert_eq!(ctx.resolve("testMethod"), Some(Value::from("disk_diffusion")));
        assert_eq!(
            ctx.resolve("interpretedResult"),
            Some(Value::from("Susceptible"))
        );
        assert_eq!(ctx.resolve("year"), Some(Value::Int(2024)));
    }

    #[test]
    fn test_open_map_resolution() {
        let ctx = sample_context().with_extra("esblConfirmed", "true");
        assert_eq!(ctx.resolve("esblConfirmed"), Some(Value::from("true")));
        assert_eq!(ctx.resolve("notThere"), None);
    }

    #[test]
    fn test_fixed_fields_shadow_open_map() {
        let ctx = sample_context().with_extra("testValue", 99i64);
        // The fixed field wins over the colliding open-map key
        assert_eq!(ctx.resolve("testValue"), Some(Value::Float(12.0)));
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        let ctx = sample_context();
        assert_eq!(ctx.resolve("testvalue"), None);
        assert_eq!(ctx.resolve("TestValue"), None);
    }

    #[test]
    fn test_context_serde() {
        let ctx = sample_context().with_extra("customFlag", "true");
        let json = serde_json::to_string(&ctx).unwrap();
        let parsed: EvaluationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.organism_id, "e_coli");
        assert_eq!(parsed.test_method, TestMethod::DiskDiffusion);
        assert_eq!(parsed.extra.get("customFlag"), Some(&Value::from("true")));
    }
}
