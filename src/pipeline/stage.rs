//! Pipeline stages and their records

use crate::diagnostics::Source;
use serde::Serialize;
use std::fmt;

/// Linear pipeline states, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Parse the raw input into a tree
    ParseInput,
    /// Schema-free grammar checks
    StructureCheck,
    /// Third-party structural validator batch
    ExternalStructuralValidate,
    /// Business-rule batch
    BusinessRuleEvaluate,
    /// Terminology batch
    TerminologyValidate,
    /// Reference batch
    ReferenceValidate,
    /// Stable merge of every batch
    Aggregate,
    /// Attach pointers and breadcrumbs
    NavigationEnrich,
    /// Build the report
    AssembleResponse,
}

impl Stage {
    /// Every stage in order
    pub const ALL: [Stage; 9] = [
        Stage::ParseInput,
        Stage::StructureCheck,
        Stage::ExternalStructuralValidate,
        Stage::BusinessRuleEvaluate,
        Stage::TerminologyValidate,
        Stage::ReferenceValidate,
        Stage::Aggregate,
        Stage::NavigationEnrich,
        Stage::AssembleResponse,
    ];

    /// Source tag of the errors a stage contributes
    pub const fn source(self) -> Option<Source> {
        match self {
            Stage::StructureCheck => Some(Source::Structure),
            Stage::ExternalStructuralValidate => Some(Source::External),
            Stage::BusinessRuleEvaluate => Some(Source::Rule),
            Stage::TerminologyValidate => Some(Source::Terminology),
            Stage::ReferenceValidate => Some(Source::Reference),
            _ => None,
        }
    }

    /// Display name
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::ParseInput => "parseInput",
            Stage::StructureCheck => "structureCheck",
            Stage::ExternalStructuralValidate => "externalStructuralValidate",
            Stage::BusinessRuleEvaluate => "businessRuleEvaluate",
            Stage::TerminologyValidate => "terminologyValidate",
            Stage::ReferenceValidate => "referenceValidate",
            Stage::Aggregate => "aggregate",
            Stage::NavigationEnrich => "navigationEnrich",
            Stage::AssembleResponse => "assembleResponse",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StageStatus {
    /// Executed
    Ran,
    /// Required input absent
    Skipped,
    /// Executed and failed; later stages still ran
    Failed,
}

/// Record of one stage in the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    /// Stage
    pub stage: Stage,
    /// Outcome
    pub status: StageStatus,
    /// Errors contributed
    pub error_count: usize,
    /// Failure description for failed stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl StageRecord {
    /// Stage that ran
    pub fn ran(stage: Stage, error_count: usize) -> Self {
        Self {
            stage,
            status: StageStatus::Ran,
            error_count,
            failure: None,
        }
    }

    /// Stage whose input was absent
    pub fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            error_count: 0,
            failure: None,
        }
    }

    /// Stage that failed
    pub fn failed(stage: Stage, failure: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            error_count: 0,
            failure: Some(failure.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_sources_follow_output_order() {
        let sources: Vec<Source> = Stage::ALL.iter().filter_map(|s| s.source()).collect();
        assert_eq!(sources, Source::ALL.to_vec());
    }

    #[test]
    fn test_record_serialization() {
        let record = StageRecord::failed(Stage::TerminologyValidate, "timeout");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({
                "stage": "terminologyValidate",
                "status": "failed",
                "errorCount": 0,
                "failure": "timeout"
            })
        );
    }
}
