// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end pipeline runs

use octofhir_bundle_validator::diagnostics::{FnProvider, ProviderError};
use octofhir_bundle_validator::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

mod utils;
use utils::{messy_bundle, observation_bundle, single_component_bundle, two_patient_bundle};

fn request(tree: &serde_json::Value) -> ValidationRequest {
    ValidationRequest::new(tree.to_string())
}

fn rule_batch() -> Arc<dyn IssueProvider> {
    Arc::new(vec![
        ExternalIssue::new(
            "Bundle.entry[1].resource.component[0].valueString",
            "SQ-001-REQUIRED",
            "Answer is required",
            Severity::Error,
        ),
        ExternalIssue::new(
            "Observation.component.where(code.coding.code='SQ-001').valueString",
            "SQ-001-SHORT",
            "Answer is short",
            Severity::Warning,
        ),
    ])
}

#[test]
fn empty_input_aborts_with_one_terminal_error() {
    let report = Validator::default().validate(&ValidationRequest::new(""));
    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.errors.len(), 0);
    assert_eq!(
        report.terminal_error.as_ref().map(|e| e.error_code.as_str()),
        Some("INPUT_UNRECOVERABLE")
    );
    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].stage, Stage::ParseInput);
    assert_eq!(report.stages[0].status, StageStatus::Failed);
}

#[test]
fn stages_run_in_fixed_order() {
    let report = Validator::default().validate(&request(&single_component_bundle()));
    let order: Vec<Stage> = report.stages.iter().map(|r| r.stage).collect();
    assert_eq!(order, Stage::ALL.to_vec());
    assert_eq!(
        report.stage(Stage::BusinessRuleEvaluate).map(|r| r.status),
        Some(StageStatus::Skipped)
    );
    assert!(report.is_valid());
}

#[test]
fn errors_are_grouped_by_source() {
    let external: Arc<dyn IssueProvider> = Arc::new(vec![ExternalIssue::new(
        "Bundle.entry[0].resource.birthDate",
        "FHIR_MISSING_REQUIRED",
        "birthDate is required",
        Severity::Error,
    )]);
    let request = request(&messy_bundle())
        .with_rules(rule_batch())
        .with_external(external);
    let report = Validator::default().validate(&request);

    let sources: Vec<Source> = report.errors.iter().map(|e| e.source).collect();
    assert_eq!(
        sources,
        vec![
            Source::Structure,
            Source::Structure,
            Source::Structure,
            Source::Structure,
            Source::Structure,
            Source::External,
            Source::Rule,
            Source::Rule,
        ]
    );
    assert_eq!(report.summary.total, 8);
    assert_eq!(report.summary.by_source.get(&Source::Rule), Some(&2));
    assert_eq!(report.summary.by_severity.get(&Severity::Warning), Some(&1));
}

#[test]
fn errors_are_enriched_with_locations() {
    let report = Validator::default().validate(&request(&single_component_bundle()).with_rules(rule_batch()));
    assert_eq!(report.errors.len(), 2);
    for error in &report.errors {
        assert_eq!(
            error.json_pointer.as_deref(),
            Some("/entry/1/resource/component/0/valueString")
        );
        assert!(error.exists);
        assert_eq!(
            error.breadcrumbs,
            vec!["Bundle", "entry[1]", "Observation", "component[0]", "valueString"]
        );
    }
}

#[test]
fn partial_locations_report_missing_parents() {
    let report = Validator::default()
        .validate(&request(&observation_bundle(json!([]))).with_rules(rule_batch()));
    let first = &report.errors[0];
    assert_eq!(first.json_pointer.as_deref(), Some("/entry/1/resource"));
    assert!(!first.exists);
    assert_eq!(first.missing_parents, vec!["component[0]", "valueString"]);
}

#[test]
fn grammar_errors_use_their_own_pointer() {
    let report = Validator::default().validate(&request(&messy_bundle()));
    let pointers: Vec<Option<&str>> = report.errors.iter().map(|e| e.json_pointer.as_deref()).collect();
    assert_eq!(
        pointers,
        vec![
            Some("/entry/0/resource/gender"),
            Some("/entry/0/resource/id"),
            Some("/entry/1/resource/component/0"),
            Some("/entry/1/resource/subject/reference"),
            Some("/entry/2/resource/item/0/answerOption/0"),
        ]
    );
    assert!(report.errors.iter().all(|e| e.exists));
    assert_eq!(
        report.errors[4].breadcrumbs,
        vec!["Bundle", "entry[2]", "Questionnaire", "item[0]", "answerOption[0]"]
    );
}

#[test]
fn entry_index_detail_positions_the_walk() {
    let issue = ExternalIssue::new("Patient.id", "RULE", "check id", Severity::Error)
        .with_detail("entryIndex", 1);
    let request = request(&two_patient_bundle())
        .with_policy(ResolutionPolicy::authoring())
        .with_rules(Arc::new(vec![issue]));
    let report = Validator::default().validate(&request);
    assert_eq!(report.errors[0].json_pointer.as_deref(), Some("/entry/1/resource/id"));
}

#[test]
fn ambiguity_is_surfaced_in_details() {
    let issue = ExternalIssue::new("Patient.id", "RULE", "check id", Severity::Error);
    let request = request(&two_patient_bundle())
        .with_policy(ResolutionPolicy::authoring())
        .with_rules(Arc::new(vec![issue]));
    let report = Validator::default().validate(&request);
    let error = &report.errors[0];
    assert!(!error.exists);
    assert_eq!(error.details["navigationAdvisory"]["kind"], json!("ambiguousEntry"));
    assert_eq!(error.details["navigationAdvisory"]["candidates"], json!([0, 1]));
}

#[test]
fn unparseable_paths_stay_unresolved() {
    let issue = ExternalIssue::new("Observation.component.count() > 1", "RULE", "too many", Severity::Error);
    let report = Validator::default()
        .validate(&request(&single_component_bundle()).with_rules(Arc::new(vec![issue])));
    let error = &report.errors[0];
    assert_eq!(error.json_pointer, None);
    assert_eq!(error.breadcrumbs, Vec::<String>::new());
    assert!(!error.exists);
}

#[test]
fn failed_provider_does_not_stop_the_run() {
    let broken = FnProvider::new("terminology server", |_tree: &serde_json::Value| {
        Err::<Vec<ExternalIssue>, _>(ProviderError::Failed {
            provider: "terminology server".into(),
            message: "timeout".into(),
        })
    });
    let request = request(&single_component_bundle())
        .with_terminology(Arc::new(broken))
        .with_rules(rule_batch());
    let report = Validator::default().validate(&request);
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(
        report.stage(Stage::TerminologyValidate).map(|r| r.status),
        Some(StageStatus::Failed)
    );
    assert_eq!(report.errors.len(), 2);
}

#[test]
fn repeated_runs_are_byte_identical() {
    let validator = Validator::default();
    let request = request(&messy_bundle()).with_rules(rule_batch());
    let first = serde_json::to_string(&validator.validate(&request).errors).unwrap();
    let second = serde_json::to_string(&validator.validate(&request).errors).unwrap();
    assert_eq!(first, second);
}

#[test]
fn full_run_leaves_the_tree_untouched() {
    let tree = messy_bundle();
    let before = serde_json::to_string(&tree).unwrap();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let snapshot = |name: &'static str| -> Arc<dyn IssueProvider> {
        let seen = Arc::clone(&seen);
        Arc::new(FnProvider::new(name, move |tree: &serde_json::Value| {
            seen.lock().unwrap().push(serde_json::to_string(tree).unwrap());
            Ok::<_, ProviderError>(vec![ExternalIssue::new(
                "Observation.component.where(valueString = 'a').valueInteger",
                name,
                "seen",
                Severity::Warning,
            )])
        }))
    };
    let request = ValidationRequest::new(before.clone())
        .with_external(snapshot("external"))
        .with_rules(snapshot("rules"))
        .with_terminology(snapshot("terminology"))
        .with_references(snapshot("references"));

    let validator = Validator::default();
    let report = validator.validate(&request);
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(request.input, before);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|snapshot| *snapshot == before));

    // Enrichment over a run context keeps the tree as parsed
    let ctx = validator.context(&before, None).unwrap();
    let errors = check_grammar(ctx.tree());
    let enriched = diagnostics::enrich(errors, &ctx);
    assert_eq!(enriched.len(), 5);
    assert_eq!(serde_json::to_string(ctx.tree()).unwrap(), before);
}

#[test]
fn cancelled_run_keeps_gathered_errors() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    let rules = FnProvider::new("rules", move |_tree: &serde_json::Value| {
        cancel.cancel();
        Ok::<_, ProviderError>(vec![ExternalIssue::new("Patient.id", "RULE", "late", Severity::Error)])
    });
    let request = request(&messy_bundle()).with_rules(Arc::new(rules));
    let report = Validator::default().validate_with_cancel(&request, &token);

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.errors.len(), 6);
    assert!(report.errors.iter().all(|e| e.json_pointer.is_none()));
    assert_eq!(report.stage(Stage::TerminologyValidate), None);
}

#[test]
fn navigation_enrichment_can_be_disabled() {
    let validator = Validator::new(ValidatorConfig::default().with_navigation_enrichment(false));
    let report = validator.validate(&request(&messy_bundle()));
    assert_eq!(
        report.stage(Stage::NavigationEnrich).map(|r| r.status),
        Some(StageStatus::Skipped)
    );
    assert_eq!(report.errors.len(), 5);
    assert!(report.errors.iter().all(|e| e.json_pointer.is_none()));
}
