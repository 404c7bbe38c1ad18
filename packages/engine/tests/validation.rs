//! Integration tests for end-to-end rule validation.
//!
//! Exercises the full selector → evaluator → aggregator path through the
//! service façade, with rule sets loaded from inline YAML.

use amr_rules_engine::{
    EvaluationContext, ExpertRuleService, Interpretation, TestMethod,
};

/// Rule set used by most scenarios: one pair-specific intrinsic
/// resistance screen, one drug-general QC check, and one global
/// reporting reminder.
const BASE_RULES: &str = r#"
name: integration fixtures
rules:
  - id: amp-ecoli-screen
    name: Ampicillin low-zone screen
    category: IntrinsicResistance
    condition: interpretedResult == "Susceptible" && testValue < 14
    action: "Zone {testValue} mm is below the screening cutoff for {drugId}"
    priority: 1
    year: 2024
    organism_id: e_coli
    drug_id: ampicillin
  - id: vanc-method-check
    name: Vancomycin method check
    category: QualityControl
    condition: testMethod == "disk_diffusion"
    action: Disk diffusion is unreliable for vancomycin
    priority: 50
    year: 2024
    drug_id: vancomycin
  - id: global-reporting
    name: Annual reporting reminder
    category: ReportingGuidance
    condition: year == 2024
    action: "Report under the 2024 standard for {organismId}"
    priority: 100
    year: 2024
"#;

// Initialize tracing subscriber (respects RUST_LOG env var)
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

fn service_with_base_rules() -> ExpertRuleService {
    init_tracing();
    let service = ExpertRuleService::in_memory();
    service
        .load_rules_yaml(BASE_RULES)
        .expect("base rule set should load");
    service
}

fn ampicillin_context(result: Interpretation) -> EvaluationContext {
    EvaluationContext::new(
        "e_coli",
        "ampicillin",
        12.0,
        TestMethod::DiskDiffusion,
        result,
        2024,
    )
}

#[test]
fn scenario_a_susceptible_low_zone_is_overridden_to_resistant() {
    let service = service_with_base_rules();
    let verdict = service
        .validate(&ampicillin_context(Interpretation::Susceptible))
        .expect("validation should succeed");

    assert!(!verdict.is_valid);
    assert_eq!(verdict.final_result, Interpretation::Resistant);
    assert_eq!(verdict.errors.len(), 1);
    assert!(verdict.errors[0].contains("12"));
    assert!(verdict.errors[0].contains("ampicillin"));
}

#[test]
fn scenario_b_method_mismatch_does_not_trigger() {
    let service = service_with_base_rules();
    // Vancomycin tested by broth microdilution: the disk-diffusion QC
    // rule must not fire, so no warning is added
    let context = EvaluationContext::new(
        "e_coli",
        "vancomycin",
        2.0,
        TestMethod::BrothMicrodilution,
        Interpretation::Susceptible,
        2024,
    );

    let verdict = service.validate(&context).expect("validation should succeed");

    assert!(verdict.warnings.is_empty());
    assert!(verdict
        .triggered_rules
        .iter()
        .all(|o| o.rule_id != "vanc-method-check"));
}

#[test]
fn scenario_c_pair_specific_rule_precedes_global_at_equal_priority() {
    init_tracing();
    let service = ExpertRuleService::in_memory();
    service
        .load_rules_yaml(
            r#"
rules:
  - id: global-rule
    name: Global rule
    category: QualityControl
    condition: year == 2024
    action: global fired
    priority: 7
    year: 2024
  - id: pair-rule
    name: Pair rule
    category: QualityControl
    condition: year == 2024
    action: pair fired
    priority: 7
    year: 2024
    organism_id: e_coli
    drug_id: ampicillin
"#,
        )
        .expect("rule set should load");

    let verdict = service
        .validate(&ampicillin_context(Interpretation::Susceptible))
        .expect("validation should succeed");

    let ids: Vec<&str> = verdict
        .triggered_rules
        .iter()
        .map(|o| o.rule_id.as_str())
        .collect();
    assert_eq!(ids, vec!["pair-rule", "global-rule"]);
}

#[test]
fn scenario_d_missing_open_map_field_fails_closed() {
    init_tracing();
    let service = ExpertRuleService::in_memory();
    service
        .load_rules_yaml(
            r#"
rules:
  - id: flag-check
    name: Custom flag check
    category: AcquiredResistance
    condition: customFlag == "true"
    action: flag was set
    year: 2024
    organism_id: e_coli
    drug_id: ampicillin
"#,
        )
        .expect("rule set should load");

    // customFlag is absent from the context's open map
    let verdict = service
        .validate(&ampicillin_context(Interpretation::Susceptible))
        .expect("validate must still return a complete verdict");

    assert!(verdict.is_valid);
    assert!(verdict.triggered_rules.is_empty());
    assert_eq!(verdict.final_result, Interpretation::Susceptible);
}

#[test]
fn open_map_field_triggers_when_present() {
    init_tracing();
    let service = ExpertRuleService::in_memory();
    service
        .load_rules_yaml(
            r#"
rules:
  - id: esbl-flag
    name: ESBL confirmed
    category: AcquiredResistance
    condition: esblConfirmed == "true"
    action: "ESBL producer: report penicillins as resistant"
    year: 2024
    organism_id: e_coli
    drug_id: ampicillin
"#,
        )
        .expect("rule set should load");

    let context =
        ampicillin_context(Interpretation::Susceptible).with_extra("esblConfirmed", "true");
    let verdict = service.validate(&context).expect("validation should succeed");

    assert!(!verdict.is_valid);
    assert_eq!(verdict.final_result, Interpretation::Resistant);
}

#[test]
fn validate_is_deterministic() {
    let service = service_with_base_rules();
    let context = ampicillin_context(Interpretation::Susceptible);

    let first = service.validate(&context).expect("validation should succeed");
    for _ in 0..5 {
        let again = service.validate(&context).expect("validation should succeed");
        assert_eq!(first.is_valid, again.is_valid);
        assert_eq!(first.final_result, again.final_result);
        assert_eq!(first.errors, again.errors);
        assert_eq!(first.warnings, again.warnings);
        assert_eq!(first.recommendations, again.recommendations);
        assert_eq!(
            first
                .triggered_rules
                .iter()
                .map(|o| o.rule_id.as_str())
                .collect::<Vec<_>>(),
            again
                .triggered_rules
                .iter()
                .map(|o| o.rule_id.as_str())
                .collect::<Vec<_>>()
        );
    }
}

#[test]
fn resistant_result_is_never_downgraded() {
    let service = service_with_base_rules();
    let verdict = service
        .validate(&ampicillin_context(Interpretation::Resistant))
        .expect("validation should succeed");

    // The screen only fires on Susceptible, and no combination of rules
    // may downgrade a Resistant interpretation
    assert_eq!(verdict.final_result, Interpretation::Resistant);
    assert!(verdict.is_valid);
}

#[test]
fn intermediate_result_is_left_untouched() {
    let service = service_with_base_rules();
    let verdict = service
        .validate(&ampicillin_context(Interpretation::Intermediate))
        .expect("validation should succeed");

    assert_eq!(verdict.final_result, Interpretation::Intermediate);
}

#[test]
fn reporting_guidance_lands_in_recommendations() {
    let service = service_with_base_rules();
    let verdict = service
        .validate(&ampicillin_context(Interpretation::Susceptible))
        .expect("validation should succeed");

    assert_eq!(verdict.recommendations.len(), 1);
    assert!(verdict.recommendations[0].contains("2024 standard"));
    assert!(verdict.recommendations[0].contains("e_coli"));
}

#[test]
fn broken_rule_does_not_abort_the_batch() {
    let service = service_with_base_rules();
    // A rule referencing a missing open-map field evaluates fail-closed
    // while the rest of the batch still runs
    service
        .load_rules_yaml(
            r#"
rules:
  - id: needs-missing-field
    name: References a missing field
    category: QualityControl
    condition: missingField == 1
    action: never fires
    priority: 999
    year: 2024
    organism_id: e_coli
    drug_id: ampicillin
"#,
        )
        .expect("rule should store");

    let verdict = service
        .validate(&ampicillin_context(Interpretation::Susceptible))
        .expect("validation should succeed despite the broken rule");

    // The intrinsic resistance screen still fired
    assert!(!verdict.is_valid);
    assert_eq!(verdict.final_result, Interpretation::Resistant);
    assert!(verdict
        .triggered_rules
        .iter()
        .all(|o| o.rule_id != "needs-missing-field"));
}

#[test]
fn soft_deleted_rule_disappears_from_verdicts() {
    let service = service_with_base_rules();
    service
        .soft_delete_rule("amp-ecoli-screen")
        .expect("soft delete should succeed");

    let verdict = service
        .validate(&ampicillin_context(Interpretation::Susceptible))
        .expect("validation should succeed");

    assert!(verdict.is_valid);
    assert_eq!(verdict.final_result, Interpretation::Susceptible);
}

#[test]
fn verdict_serializes_to_json() {
    let service = service_with_base_rules();
    let verdict = service
        .validate(&ampicillin_context(Interpretation::Susceptible))
        .expect("validation should succeed");

    let json = serde_json::to_string(&verdict).expect("verdict should serialize");
    assert!(json.contains("\"is_valid\":false"));
    assert!(json.contains("\"final_result\":\"Resistant\""));
}
