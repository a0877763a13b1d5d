use criterion::{Criterion, black_box, criterion_group, criterion_main};
use octofhir_bundle_validator::{
    ExternalIssue, IssueProvider, PathCache, ResolutionPolicy, RunContext, Severity,
    ValidationRequest, Validator, check_grammar,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn create_bundle(entries: usize) -> Value {
    let entries: Vec<Value> = (0..entries)
        .map(|i| {
            json!({
                "fullUrl": format!("urn:uuid:00000000-0000-4000-8000-{i:012}"),
                "resource": {
                    "resourceType": "Observation",
                    "id": format!("obs-{i}"),
                    "status": "final",
                    "subject": {"reference": "Patient/p1"},
                    "component": [
                        {"code": {"coding": [{"system": "http://loinc.org", "code": "SQ-001"}]}, "valueString": "a"},
                        {"code": {"coding": [{"system": "http://loinc.org", "code": "SQ-002"}]}, "valueInteger": 2}
                    ]
                }
            })
        })
        .chain(std::iter::once(json!({
            "fullUrl": "http://example.org/fhir/Patient/p1",
            "resource": {"resourceType": "Patient", "id": "p1", "gender": "female"}
        })))
        .collect();
    json!({"resourceType": "Bundle", "type": "collection", "entry": entries})
}

fn benchmark_navigation(c: &mut Criterion) {
    let ctx = RunContext::new(
        create_bundle(100),
        ResolutionPolicy::runtime(),
        Arc::new(PathCache::default()),
    );
    let paths = [
        "Bundle.entry[50].resource.component[1].valueInteger",
        "Patient.gender",
        "Observation.component.where(code.coding.code = 'SQ-002').valueInteger",
        "Bundle.entry[99].resource.component[5].valueString",
    ];

    for (i, path) in paths.into_iter().enumerate() {
        c.bench_function(&format!("navigate_{i}"), |b| {
            b.iter(|| black_box(ctx.navigate(black_box(path), None)))
        });
    }
}

fn benchmark_grammar(c: &mut Criterion) {
    let bundle = create_bundle(100);

    c.bench_function("grammar_100_entries", |b| {
        b.iter(|| black_box(check_grammar(black_box(&bundle))))
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    let validator = Validator::default();
    let rules: Arc<dyn IssueProvider> = Arc::new(
        (0..100)
            .map(|i| {
                ExternalIssue::new(
                    format!("Bundle.entry[{i}].resource.component[0].valueString"),
                    "SQ-001-REQUIRED",
                    "Answer is required",
                    Severity::Error,
                )
            })
            .collect::<Vec<_>>(),
    );
    let request = ValidationRequest::new(create_bundle(100).to_string()).with_rules(rules);

    c.bench_function("pipeline_100_entries", |b| {
        b.iter(|| black_box(validator.validate(black_box(&request))))
    });
}

criterion_group!(
    benches,
    benchmark_navigation,
    benchmark_grammar,
    benchmark_pipeline
);
criterion_main!(benches);
