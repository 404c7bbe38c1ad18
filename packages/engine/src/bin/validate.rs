//! CLI binary for validating a test outcome against a rule set via stdin.
//!
//! Usage:
//!   echo '{"rules_yaml": "...", "context": {...}}' | cargo run --bin validate
//!
//! Input (JSON on stdin):
//!   - rules_yaml: String — a rule-set YAML document
//!   - context: Object — the evaluation context:
//!       organism_id, drug_id, test_value, test_method,
//!       interpreted_result, year, and an optional `extra` map
//!
//! Output (JSON on stdout):
//!   - is_valid, final_result, triggered_rules, errors, warnings,
//!     recommendations — the full verdict
//!   - error: Optional<String> — error message if validation failed

use amr_rules_engine::{EvaluationContext, ExpertRuleService, ValidationVerdict};
use std::io::Read;

#[derive(serde::Deserialize)]
struct ValidateRequest {
    rules_yaml: String,
    context: EvaluationContext,
}

#[derive(serde::Serialize)]
struct ValidateResponse {
    #[serde(flatten)]
    verdict: Option<ValidationVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn error_response(msg: String) -> ValidateResponse {
    ValidateResponse {
        verdict: None,
        error: Some(msg),
    }
}

fn main() {
    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        let resp = error_response(format!("Failed to read stdin: {e}"));
        println!("{}", serde_json::to_string(&resp).unwrap_or_default());
        std::process::exit(1);
    }

    let request: ValidateRequest = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => {
            let resp = error_response(format!("Failed to parse request JSON: {e}"));
            println!("{}", serde_json::to_string(&resp).unwrap_or_default());
            std::process::exit(1);
        }
    };

    let service = ExpertRuleService::in_memory();

    if let Err(e) = service.load_rules_yaml(&request.rules_yaml) {
        let resp = error_response(format!("Failed to load rules YAML: {e}"));
        println!("{}", serde_json::to_string(&resp).unwrap_or_default());
        std::process::exit(1);
    }

    match service.validate(&request.context) {
        Ok(verdict) => {
            let resp = ValidateResponse {
                verdict: Some(verdict),
                error: None,
            };
            println!("{}", serde_json::to_string(&resp).unwrap_or_default());
        }
        Err(e) => {
            let resp = error_response(format!("{e}"));
            println!("{}", serde_json::to_string(&resp).unwrap_or_default());
            std::process::exit(1);
        }
    }
}
