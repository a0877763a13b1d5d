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

//! Independent documents validated concurrently
//!
//! Runs share a validator and its path cache but nothing else, so results
//! must match sequential runs exactly.

use octofhir_bundle_validator::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

mod utils;
use utils::{messy_bundle, observation_bundle, single_component_bundle, two_patient_bundle};

fn requests() -> Vec<ValidationRequest> {
    let rules: Arc<dyn IssueProvider> = Arc::new(vec![ExternalIssue::new(
        "Observation.component[0].valueString",
        "SQ-001-REQUIRED",
        "Answer is required",
        Severity::Error,
    )]);
    vec![
        ValidationRequest::new(messy_bundle().to_string()).with_rules(Arc::clone(&rules)),
        ValidationRequest::new(single_component_bundle().to_string()).with_rules(Arc::clone(&rules)),
        ValidationRequest::new(observation_bundle(json!([])).to_string()).with_rules(rules),
        ValidationRequest::new(two_patient_bundle().to_string()),
        ValidationRequest::new("null"),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_match_sequential_runs() {
    let validator = Arc::new(Validator::default());
    let sequential: Vec<ValidationReport> = requests().iter().map(|r| validator.validate(r)).collect();

    let mut handles = Vec::new();
    for _ in 0..8 {
        for request in requests() {
            let validator = Arc::clone(&validator);
            handles.push(tokio::task::spawn_blocking(move || validator.validate(&request)));
        }
    }

    let mut reports = Vec::new();
    for handle in handles {
        reports.push(handle.await.expect("validation task panicked"));
    }

    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report, &sequential[i % sequential.len()]);
    }
}

#[test]
fn validate_all_keeps_request_order() {
    let validator = Validator::default();
    let reports = validator.validate_all(&requests());

    let statuses: Vec<RunStatus> = reports.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            RunStatus::Completed,
            RunStatus::Completed,
            RunStatus::Completed,
            RunStatus::Completed,
            RunStatus::Aborted,
        ]
    );
    assert_eq!(reports[0].errors.len(), 6);
    assert!(reports[1].errors[0].exists);
    assert!(!reports[2].errors[0].exists);
    assert!(reports[3].is_valid());
}

#[test]
fn shared_path_cache_is_reused_across_runs() {
    let validator = Validator::default();
    let request = ValidationRequest::new(single_component_bundle().to_string()).with_rules(Arc::new(vec![
        ExternalIssue::new("Observation.status", "RULE", "status", Severity::Warning),
    ]));
    validator.validate(&request);
    validator.validate(&request);
    let stats = validator.path_cache().stats();
    assert!(stats.hits >= 1, "{stats:?}");
}

#[test]
fn more_requests_than_workers() {
    let validator = Validator::default();
    let batch: Vec<ValidationRequest> = (0..6).flat_map(|_| requests()).collect();
    let expected: Vec<ValidationReport> = requests().iter().map(|r| validator.validate(r)).collect();

    let reports = validator.validate_all_with_workers(&batch, 2);
    assert_eq!(reports.len(), 30);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report, &expected[i % expected.len()]);
    }
}
