// Crate-level error types

use crate::bundle::ResolutionError;
use crate::diagnostics::ProviderError;
use crate::parser::ParseError;
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

/// Result type for validator operations
pub type Result<T> = std::result::Result<T, ValidatorError>;

/// Errors surfaced by the validator's public API
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// Input that cannot produce any report (empty, null, not JSON, not an object)
    #[error("Unrecoverable input: {reason}")]
    UnrecoverableInput {
        /// What is wrong with the input
        reason: Cow<'static, str>,
    },

    /// Path expression error
    #[error("Path error: {0}")]
    Parse(#[from] ParseError),

    /// Entry resolution error
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Collaborator failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration could not be read
    #[error("Invalid configuration: {message}")]
    Config {
        /// Decoding error
        message: String,
    },

    /// I/O failure reading input or configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidatorError {
    /// Machine readable code for reports
    pub fn code(&self) -> &'static str {
        match self {
            ValidatorError::UnrecoverableInput { .. } => "INPUT_UNRECOVERABLE",
            ValidatorError::Parse(_) => "PATH_PARSE_ERROR",
            ValidatorError::Resolution(_) => "ENTRY_RESOLUTION_ERROR",
            ValidatorError::Provider(_) => "PROVIDER_ERROR",
            ValidatorError::Config { .. } => "CONFIG_ERROR",
            ValidatorError::Io(_) => "IO_ERROR",
        }
    }

    fn unrecoverable(reason: impl Into<Cow<'static, str>>) -> Self {
        ValidatorError::UnrecoverableInput {
            reason: reason.into(),
        }
    }
}

/// Parse raw input text into a tree
///
/// Empty or whitespace-only text, `null`, invalid JSON and non-object
/// documents are unrecoverable.
pub fn parse_input(input: &str) -> Result<Value> {
    if input.trim().is_empty() {
        return Err(ValidatorError::unrecoverable("input is empty"));
    }
    let tree: Value = serde_json::from_str(input)
        .map_err(|e| ValidatorError::unrecoverable(format!("input is not valid JSON: {e}")))?;
    match tree {
        Value::Object(_) => Ok(tree),
        Value::Null => Err(ValidatorError::unrecoverable("input is null")),
        _ => Err(ValidatorError::unrecoverable("input must be a JSON object")),
    }
}
