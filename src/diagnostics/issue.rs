//! Issue batches from external collaborators
//!
//! Schema validators, rule engines, terminology and reference checkers are
//! consumed only through [`IssueProvider`]: they hand back already computed
//! `(path, errorCode, message, severity, details)` records.

use super::diagnostic::{Details, Severity, Source, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One finding as reported by a collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIssue {
    /// Location path, possibly empty
    #[serde(default)]
    pub path: String,
    /// Machine readable code
    #[serde(alias = "code")]
    pub error_code: String,
    /// Human readable message
    pub message: String,
    /// Severity, error when omitted
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Type of the resource concerned
    #[serde(default)]
    pub resource_type: Option<String>,
    /// Open details (`entryIndex`, `fullUrl`, `reference` position the path)
    #[serde(default)]
    pub details: Details,
}

fn default_severity() -> Severity {
    Severity::Error
}

impl ExternalIssue {
    /// Create an issue
    pub fn new(
        path: impl Into<String>,
        error_code: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            path: path.into(),
            error_code: error_code.into(),
            message: message.into(),
            severity,
            resource_type: None,
            details: Details::new(),
        }
    }

    /// Add one detail entry
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Set the resource type
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Tag with the stage that consumed it
    pub fn into_error(self, source: Source) -> ValidationError {
        ValidationError {
            source,
            severity: self.severity,
            resource_type: self.resource_type,
            raw_path: self.path,
            error_code: self.error_code,
            message: self.message,
            details: self.details,
            pointer_hint: None,
        }
    }
}

/// Failure of a collaborator to produce its batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The collaborator ran and failed
    #[error("{provider} failed: {message}")]
    Failed {
        /// Provider name
        provider: String,
        /// Failure description
        message: String,
    },

    /// The collaborator's output could not be read
    #[error("{provider} returned malformed issues: {message}")]
    Malformed {
        /// Provider name
        provider: String,
        /// Decoding error
        message: String,
    },
}

/// Source of already computed issues for one stage
pub trait IssueProvider: Send + Sync {
    /// Name used in logs and stage records
    fn name(&self) -> &str {
        "issue provider"
    }

    /// Produce the batch for `tree`; must not retain or mutate it
    fn issues(&self, tree: &Value) -> Result<Vec<ExternalIssue>, ProviderError>;
}

impl IssueProvider for Vec<ExternalIssue> {
    fn name(&self) -> &str {
        "issue batch"
    }

    fn issues(&self, _tree: &Value) -> Result<Vec<ExternalIssue>, ProviderError> {
        Ok(self.clone())
    }
}

/// Provider backed by a closure
pub struct FnProvider<F> {
    name: String,
    produce: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&Value) -> Result<Vec<ExternalIssue>, ProviderError> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(name: impl Into<String>, produce: F) -> Self {
        Self {
            name: name.into(),
            produce,
        }
    }
}

impl<F> IssueProvider for FnProvider<F>
where
    F: Fn(&Value) -> Result<Vec<ExternalIssue>, ProviderError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn issues(&self, tree: &Value) -> Result<Vec<ExternalIssue>, ProviderError> {
        (self.produce)(tree)
    }
}

/// Decode a JSON array of issues, e.g. a batch file
pub fn issues_from_json(provider: &str, text: &str) -> Result<Vec<ExternalIssue>, ProviderError> {
    serde_json::from_str(text).map_err(|e| ProviderError::Malformed {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_with_defaults_and_aliases() {
        let issues = issues_from_json(
            "rules",
            r#"[{"path": "Patient.name", "code": "R1", "message": "m"},
                {"errorCode": "R2", "message": "n", "severity": "warning", "details": {"entryIndex": 2}}]"#,
        )
        .unwrap();
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].error_code, "R1");
        assert_eq!(issues[1].path, "");
        assert_eq!(issues[1].details["entryIndex"], json!(2));
        assert!(matches!(
            issues_from_json("rules", "{"),
            Err(ProviderError::Malformed { .. })
        ));
    }

    #[test]
    fn test_into_error_keeps_fields() {
        let error = ExternalIssue::new("Observation.code", "T1", "unknown code", Severity::Warning)
            .with_resource_type("Observation")
            .with_detail("system", "http://loinc.org")
            .into_error(Source::Terminology);
        assert_eq!(error.source, Source::Terminology);
        assert_eq!(error.raw_path, "Observation.code");
        assert_eq!(error.resource_type.as_deref(), Some("Observation"));
        assert_eq!(error.details["system"], json!("http://loinc.org"));
    }

    #[test]
    fn test_closure_provider() {
        let provider = FnProvider::new("terminology", |tree: &Value| {
            Ok::<_, ProviderError>(vec![ExternalIssue::new(
                "",
                "SEEN",
                tree["resourceType"].as_str().unwrap_or_default(),
                Severity::Information,
            )])
        });
        let issues = provider.issues(&json!({"resourceType": "Bundle"})).unwrap();
        assert_eq!(issues[0].message, "Bundle");
        assert_eq!(provider.name(), "terminology");
    }
}
