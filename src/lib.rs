//! Deterministic, pointer-addressable validation reports for FHIR JSON bundles
//!
//! The crate turns findings from several sources (schema-free grammar
//! checks, a structural validator, business rules, terminology and
//! reference checks) into one ordered list of errors, each carrying the
//! JSON pointer, breadcrumbs and missing segments of the location it names.
//!
//! ```
//! use octofhir_bundle_validator::{ValidationRequest, Validator};
//!
//! let input = r#"{"resourceType": "Patient", "id": "abc_def!"}"#;
//! let report = Validator::default().validate(&ValidationRequest::new(input));
//! assert_eq!(report.errors[0].error_code, "FHIR_INVALID_ID_FORMAT");
//! assert_eq!(report.errors[0].json_pointer.as_deref(), Some("/id"));
//! ```

pub mod ast;
pub mod bundle;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod grammar;
pub mod navigator;
pub mod parser;
pub mod pipeline;

// Re-export main types
pub use ast::{PathExpression, Step};
pub use bundle::{EntryIndexMap, EntryResolver, ResolutionError, ResolutionPolicy};
pub use config::ValidatorConfig;
pub use diagnostics::{
    ExternalIssue, IssueProvider, ProviderError, Severity, Source, UnifiedError, ValidationError,
};
pub use error::{Result, ValidatorError};
pub use grammar::{GrammarConfig, GrammarValidator, StructuralCode};
pub use navigator::{JsonNavigator, NavigationAdvisory, ResolvedLocation};
pub use parser::{ParseError, PathCache, parse_path as parse};
pub use pipeline::{
    CancellationToken, RunContext, RunStatus, Stage, StageStatus, ValidationReport,
    ValidationRequest, Validator,
};

use serde_json::Value;

/// Navigate `path` over `tree` using the process-wide path cache
///
/// Builds a throwaway entry index, so prefer [`RunContext`] when several
/// paths are navigated over the same tree. Returns `None` when the path
/// does not parse.
pub fn navigate(
    tree: &Value,
    path: &str,
    start_entry: Option<usize>,
    policy: ResolutionPolicy,
) -> Option<ResolvedLocation> {
    let expr = PathCache::global().get_or_parse(path).ok()?;
    let resolver = EntryResolver::new(EntryIndexMap::build(tree));
    Some(JsonNavigator::new(tree, &resolver).navigate(&expr, start_entry, policy))
}

/// Run the grammar checks alone with the default field tables
pub fn check_grammar(tree: &Value) -> Vec<ValidationError> {
    GrammarValidator::default().validate(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_free_navigate() {
        let tree = json!({"resourceType": "Patient", "name": [{"family": "Doe"}]});
        let location = navigate(&tree, "Patient.name.family", None, ResolutionPolicy::FirstMatch).unwrap();
        assert_eq!(location.json_pointer, "/name/0/family");
        assert!(navigate(&tree, "Patient.name.first()", None, ResolutionPolicy::FirstMatch).is_none());
    }

    #[test]
    fn test_free_check_grammar() {
        let errors = check_grammar(&json!({"resourceType": "Patient", "id": "a b"}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_code, StructuralCode::FhirInvalidIdFormat.as_str());
    }
}
