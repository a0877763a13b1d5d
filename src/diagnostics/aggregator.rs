//! Deterministic merge of per-stage error batches

use super::diagnostic::{Source, UnifiedError, ValidationError};
use crate::pipeline::RunContext;
use serde_json::Value;

/// Collects errors by source, keeping emission order within each source
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    batches: [Vec<ValidationError>; Source::ALL.len()],
}

impl ErrorAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch; each error goes to the bucket of its own source
    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        for error in errors {
            self.batches[error.source.order()].push(error);
        }
    }

    /// Errors collected for one source
    pub fn batch(&self, source: Source) -> &[ValidationError] {
        &self.batches[source.order()]
    }

    /// Total number of errors
    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// True when nothing was collected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten in source order, then emission order
    pub fn merged(self) -> Vec<ValidationError> {
        self.batches.into_iter().flatten().collect()
    }
}

/// Attach navigation metadata to every error
pub fn enrich(errors: Vec<ValidationError>, ctx: &RunContext) -> Vec<UnifiedError> {
    errors.into_iter().map(|error| enrich_one(error, ctx)).collect()
}

/// Attach navigation metadata to one error
///
/// The raw path is navigated first. A known pointer is used when the path
/// is empty, does not parse, or stops short of it. Errors with neither keep
/// null navigation fields.
pub fn enrich_one(error: ValidationError, ctx: &RunContext) -> UnifiedError {
    let start = start_entry(&error, ctx);
    let navigated = if error.raw_path.trim().is_empty() {
        None
    } else {
        ctx.navigate(&error.raw_path, start)
    };

    let location = match (navigated, error.pointer_hint.as_deref()) {
        (Some(location), _) if location.exists => Some(location),
        (navigated, Some(pointer)) => ctx
            .locate_pointer(pointer, error.resource_type.as_deref())
            .or(navigated),
        (navigated, None) => navigated,
    };

    match location {
        Some(location) => UnifiedError::located(error, location),
        None => UnifiedError::unresolved(error),
    }
}

/// Starting entry named by an error's details
///
/// `entryIndex` is taken as is; `fullUrl` and `reference` are resolved
/// against the run's entries.
fn start_entry(error: &ValidationError, ctx: &RunContext) -> Option<usize> {
    if let Some(index) = error.details.get("entryIndex").and_then(Value::as_u64) {
        return usize::try_from(index).ok();
    }
    for key in ["fullUrl", "reference"] {
        let Some(reference) = error.details.get(key).and_then(Value::as_str) else {
            continue;
        };
        match ctx.resolve_reference(reference) {
            Ok(index) => return Some(index),
            Err(err) => log::debug!("{key} '{reference}' gives no start entry: {err}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::ResolutionPolicy;
    use crate::diagnostics::Severity;
    use crate::grammar::StructuralCode;
    use crate::parser::PathCache;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> RunContext {
        RunContext::new(
            json!({
                "resourceType": "Bundle",
                "entry": [
                    {"fullUrl": "http://example.org/fhir/Patient/a",
                     "resource": {"resourceType": "Patient", "id": "a", "name": [{"family": "A"}]}},
                    {"fullUrl": "http://example.org/fhir/Patient/b",
                     "resource": {"resourceType": "Patient", "id": "b"}}
                ]
            }),
            ResolutionPolicy::FirstMatch,
            Arc::new(PathCache::new(64)),
        )
    }

    fn error(source: Source, code: &str) -> ValidationError {
        ValidationError::new(source, Severity::Warning, code, code)
    }

    #[test]
    fn test_merge_order_is_by_stage_then_emission() {
        let mut aggregator = ErrorAggregator::new();
        aggregator.extend(vec![error(Source::Reference, "ref-1"), error(Source::Rule, "rule-1")]);
        aggregator.extend(vec![
            ValidationError::structural(StructuralCode::FhirInvalidIdFormat, "id"),
            error(Source::Rule, "rule-2"),
            error(Source::External, "ext-1"),
        ]);
        assert_eq!(aggregator.len(), 5);
        assert_eq!(aggregator.batch(Source::Rule).len(), 2);
        let codes: Vec<String> = aggregator.merged().into_iter().map(|e| e.error_code).collect();
        assert_eq!(
            codes,
            vec!["FHIR_INVALID_ID_FORMAT", "ext-1", "rule-1", "rule-2", "ref-1"]
        );
    }

    #[test]
    fn test_enrich_resolves_raw_path() {
        let ctx = context();
        let unified = enrich_one(error(Source::Rule, "r").with_path("Patient.name.family"), &ctx);
        assert_eq!(unified.json_pointer.as_deref(), Some("/entry/0/resource/name/0/family"));
        assert!(unified.exists);
        assert_eq!(unified.breadcrumbs, vec!["Bundle", "entry[0]", "Patient", "name[0]", "family"]);
    }

    #[test]
    fn test_full_url_detail_selects_entry() {
        let ctx = context();
        let unified = enrich_one(
            error(Source::Reference, "r")
                .with_path("Patient.id")
                .with_detail("fullUrl", "http://example.org/fhir/Patient/b"),
            &ctx,
        );
        assert_eq!(unified.json_pointer.as_deref(), Some("/entry/1/resource/id"));

        let unified = enrich_one(
            error(Source::External, "e").with_path("Patient.id").with_detail("entryIndex", 1),
            &ctx,
        );
        assert_eq!(unified.json_pointer.as_deref(), Some("/entry/1/resource/id"));
    }

    #[test]
    fn test_unparseable_path_keeps_null_navigation() {
        let ctx = context();
        let unified = enrich_one(error(Source::Rule, "r").with_path("Patient.name.count() > 1"), &ctx);
        assert_eq!(unified.json_pointer, None);
        assert!(!unified.exists);
        assert!(unified.breadcrumbs.is_empty());
        assert_eq!(unified.path, "Patient.name.count() > 1");
    }

    #[test]
    fn test_pointer_hint_fallback() {
        let ctx = context();
        let unified = enrich_one(
            ValidationError::structural(StructuralCode::FhirInvalidIdFormat, "bad")
                .with_path("Bundle.entry[1].resource.where")
                .with_pointer_hint("/entry/1/resource/id"),
            &ctx,
        );
        assert_eq!(unified.json_pointer.as_deref(), Some("/entry/1/resource/id"));
        assert!(unified.exists);
    }

    #[test]
    fn test_partial_location_is_reported() {
        let ctx = context();
        let unified = enrich_one(error(Source::Rule, "r").with_path("Patient.telecom.value"), &ctx);
        assert_eq!(unified.json_pointer.as_deref(), Some("/entry/0/resource"));
        assert!(!unified.exists);
        assert_eq!(unified.missing_parents, vec!["telecom", "value"]);
    }
}
