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

//! Shared fixtures for integration tests

#![allow(dead_code)]

use serde_json::{Value, json};

/// Bundle with a Patient at entry 0 and an Observation at entry 1
pub fn observation_bundle(components: Value) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [
            {
                "fullUrl": "urn:uuid:7f6a1e0c-2c1b-4c55-9f3a-0a3b4c5d6e7f",
                "resource": {"resourceType": "Patient", "id": "pat-1", "gender": "female"}
            },
            {
                "fullUrl": "http://example.org/fhir/Observation/obs-1",
                "resource": {
                    "resourceType": "Observation",
                    "id": "obs-1",
                    "status": "final",
                    "subject": {"reference": "urn:uuid:7f6a1e0c-2c1b-4c55-9f3a-0a3b4c5d6e7f"},
                    "component": components
                }
            }
        ]
    })
}

/// Observation bundle whose single component has `valueString: "ok"`
pub fn single_component_bundle() -> Value {
    observation_bundle(json!([
        {"code": {"coding": [{"system": "http://loinc.org", "code": "SQ-001"}]}, "valueString": "ok"}
    ]))
}

/// Bundle with two Patient entries
pub fn two_patient_bundle() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [
            {"fullUrl": "http://example.org/fhir/Patient/a",
             "resource": {"resourceType": "Patient", "id": "a"}},
            {"fullUrl": "http://example.org/fhir/Patient/b",
             "resource": {"resourceType": "Patient", "id": "b"}}
        ]
    })
}

/// Bundle with grammar violations spread over several entries
pub fn messy_bundle() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [
            {"resource": {"resourceType": "Patient", "id": "abc_def!", "gender": "fe male"}},
            {"resource": {
                "resourceType": "Observation",
                "id": "obs-2",
                "status": "final",
                "subject": {"reference": "Patient"},
                "component": [{"valueString": "a", "valueInteger": 1}]
            }},
            {"resource": {
                "resourceType": "Questionnaire",
                "id": "q",
                "item": [{"linkId": "1", "text": "Q", "answerOption": [{}]}]
            }}
        ]
    })
}
