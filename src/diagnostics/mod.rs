//! Error model, collaborator seam, merge and report formatting
//!
//! Every stage reports into the same [`ValidationError`] shape; the
//! aggregator merges batches in stage order and enriches each record with
//! navigation data to produce [`UnifiedError`]s.

#![warn(missing_docs)]

pub mod aggregator;
pub mod diagnostic;
pub mod formatter;
pub mod issue;

pub use aggregator::{ErrorAggregator, enrich, enrich_one};
pub use diagnostic::{Details, Severity, Source, UnifiedError, ValidationError};
pub use formatter::{Format, ReportFormatter};
pub use issue::{ExternalIssue, FnProvider, IssueProvider, ProviderError, issues_from_json};
