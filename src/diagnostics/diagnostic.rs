//! Common error shapes shared by every stage

use crate::grammar::StructuralCode;
use crate::navigator::ResolvedLocation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Open detail map carried by every error, in insertion order
pub type Details = IndexMap<String, Value>;

/// Stage that produced an error
///
/// Declaration order is the fixed output order of the merged report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    /// Grammar validator
    Structure,
    /// Third-party structural (schema/profile) validator
    External,
    /// Business-rule evaluator
    Rule,
    /// Terminology checker
    Terminology,
    /// Reference checker
    Reference,
}

impl Source {
    /// All sources in output order
    pub const ALL: [Source; 5] = [
        Source::Structure,
        Source::External,
        Source::Rule,
        Source::Terminology,
        Source::Reference,
    ];

    /// Position in the output order
    pub const fn order(self) -> usize {
        self as usize
    }

    /// Wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Source::Structure => "structure",
            Source::External => "external",
            Source::Rule => "rule",
            Source::Terminology => "terminology",
            Source::Reference => "reference",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocking
    #[serde(alias = "fatal")]
    Error,
    /// Non-blocking
    Warning,
    /// Informational
    #[serde(alias = "info")]
    Information,
}

impl Severity {
    /// Wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error as emitted by a stage, before navigation enrichment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Producing stage
    pub source: Source,
    /// Severity
    pub severity: Severity,
    /// Type of the resource the error is about
    pub resource_type: Option<String>,
    /// Location path as emitted, possibly empty
    pub raw_path: String,
    /// Machine readable code
    pub error_code: String,
    /// Human readable message
    pub message: String,
    /// Open details
    pub details: Details,
    /// Exact pointer, when the producer knows it
    #[serde(skip)]
    pub pointer_hint: Option<String>,
}

impl ValidationError {
    /// Create an error with no location
    pub fn new(
        source: Source,
        severity: Severity,
        error_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            severity,
            resource_type: None,
            raw_path: String::new(),
            error_code: error_code.into(),
            message: message.into(),
            details: Details::new(),
            pointer_hint: None,
        }
    }

    /// Grammar violation, always at error severity
    pub fn structural(code: StructuralCode, message: impl Into<String>) -> Self {
        Self::new(Source::Structure, Severity::Error, code.as_str(), message)
    }

    /// Set the raw path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.raw_path = path.into();
        self
    }

    /// Set the resource type
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Add one detail entry
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Set the known pointer
    pub fn with_pointer_hint(mut self, pointer: impl Into<String>) -> Self {
        self.pointer_hint = Some(pointer.into());
        self
    }

    /// True for error severity
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Final error record, with navigation metadata attached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedError {
    /// Producing stage
    pub source: Source,
    /// Severity
    pub severity: Severity,
    /// Type of the resource the error is about
    pub resource_type: Option<String>,
    /// Original raw path
    pub path: String,
    /// Resolved pointer, null when the path could not be used
    pub json_pointer: Option<String>,
    /// Machine readable code
    pub error_code: String,
    /// Human readable message
    pub message: String,
    /// Open details
    pub details: Details,
    /// Label trail of the resolved part
    pub breadcrumbs: Vec<String>,
    /// Whether the full path resolved
    pub exists: bool,
    /// Unresolved step descriptors
    pub missing_parents: Vec<String>,
}

impl UnifiedError {
    /// Carry an error over without navigation data
    pub fn unresolved(error: ValidationError) -> Self {
        Self {
            source: error.source,
            severity: error.severity,
            resource_type: error.resource_type,
            path: error.raw_path,
            json_pointer: None,
            error_code: error.error_code,
            message: error.message,
            details: error.details,
            breadcrumbs: Vec::new(),
            exists: false,
            missing_parents: Vec::new(),
        }
    }

    /// Attach a navigation result
    pub fn located(error: ValidationError, location: ResolvedLocation) -> Self {
        let mut unified = Self::unresolved(error);
        if let Some(advisory) = &location.advisory {
            if let Ok(value) = serde_json::to_value(advisory) {
                unified.details.insert("navigationAdvisory".to_string(), value);
            }
        }
        unified.json_pointer = Some(location.json_pointer);
        unified.breadcrumbs = location.breadcrumbs;
        unified.exists = location.exists;
        unified.missing_parents = location.missing_parents;
        unified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::NavigationAdvisory;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_source_order() {
        let mut sources = vec![Source::Reference, Source::Structure, Source::Rule];
        sources.sort();
        assert_eq!(sources, vec![Source::Structure, Source::Rule, Source::Reference]);
        assert_eq!(Source::Terminology.order(), 3);
    }

    #[test]
    fn test_severity_wire_names() {
        assert_eq!(serde_json::to_value(Severity::Information).unwrap(), json!("information"));
        let parsed: Severity = serde_json::from_value(json!("info")).unwrap();
        assert_eq!(parsed, Severity::Information);
    }

    #[test]
    fn test_unified_error_shape() {
        let error = ValidationError::new(Source::Rule, Severity::Warning, "RULE_1", "check failed")
            .with_path("Patient.name")
            .with_resource_type("Patient")
            .with_detail("ruleId", "r1");
        let unified = UnifiedError::located(
            error,
            ResolvedLocation {
                json_pointer: "".into(),
                exists: false,
                missing_parents: vec!["Patient".into(), "name".into()],
                breadcrumbs: vec!["Bundle".into()],
                advisory: Some(NavigationAdvisory::EntryNotFound {
                    resource_type: "Patient".into(),
                }),
            },
        );
        assert_eq!(
            serde_json::to_value(&unified).unwrap(),
            json!({
                "source": "rule",
                "severity": "warning",
                "resourceType": "Patient",
                "path": "Patient.name",
                "jsonPointer": "",
                "errorCode": "RULE_1",
                "message": "check failed",
                "details": {
                    "ruleId": "r1",
                    "navigationAdvisory": {"kind": "entryNotFound", "resourceType": "Patient"}
                },
                "breadcrumbs": ["Bundle"],
                "exists": false,
                "missingParents": ["Patient", "name"]
            })
        );
    }

    #[test]
    fn test_unresolved_has_null_pointer() {
        let error = ValidationError::structural(StructuralCode::FhirInvalidIdFormat, "bad id");
        let unified = UnifiedError::unresolved(error);
        assert_eq!(unified.json_pointer, None);
        assert_eq!(unified.severity, Severity::Error);
        assert_eq!(unified.error_code, "FHIR_INVALID_ID_FORMAT");
    }
}
