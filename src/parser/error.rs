//! Parser error types

use std::borrow::Cow;
use thiserror::Error;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error with location information
///
/// Every variant is cheap to clone so that failed parses can be cached
/// alongside successful ones.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Empty or whitespace-only path
    #[error("Empty path expression")]
    EmptyInput,

    /// Character that cannot start any token
    #[error("Invalid character '{ch}' at position {position}")]
    InvalidCharacter {
        /// Offending character
        ch: char,
        /// Byte offset in the input
        position: usize,
    },

    /// Unexpected token
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token that was found
        token: Cow<'static, str>,
        /// Position where the token was found
        position: usize,
    },

    /// Expected token
    #[error("Expected {expected} at position {position}")]
    ExpectedToken {
        /// The expected token description
        expected: Cow<'static, str>,
        /// Position where the token was expected
        position: usize,
    },

    /// Unexpected end of input at specific position
    #[error("Unexpected end of input at position {position}, expected {expected}")]
    UnexpectedEndOfInput {
        /// What the parser was looking for
        expected: Cow<'static, str>,
        /// Position where more input was expected
        position: usize,
    },

    /// Unclosed string literal
    #[error("Unclosed string literal starting at position {position}")]
    UnclosedString {
        /// Position of the opening quote
        position: usize,
    },

    /// Invalid escape sequence inside a string literal
    #[error("Invalid escape sequence '\\{sequence}' at position {position}")]
    InvalidEscape {
        /// Escape body without the backslash
        sequence: String,
        /// Position of the backslash
        position: usize,
    },

    /// Number literal that cannot be represented
    #[error("Invalid number '{text}' at position {position}")]
    InvalidNumber {
        /// Raw literal text
        text: String,
        /// Position of the literal
        position: usize,
    },

    /// Construct outside the restricted path grammar
    #[error("Unsupported construct '{construct}' at position {position}")]
    Unsupported {
        /// Short description of the construct
        construct: Cow<'static, str>,
        /// Position where it starts
        position: usize,
    },

    /// `and` and `or` mixed without grouping
    #[error("Mixed 'and'/'or' without explicit grouping at position {position}")]
    MixedLogicalOperators {
        /// Position of the operator that switched the chain
        position: usize,
    },

    /// More than one `where(...)` in one path, or a `where` inside a `where`
    #[error("Only one non-nested where(...) clause is allowed (position {position})")]
    NestedPredicate {
        /// Position of the second `where`
        position: usize,
    },
}

impl ParseError {
    /// Byte offset associated with the error, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::EmptyInput => None,
            ParseError::InvalidCharacter { position, .. }
            | ParseError::UnexpectedToken { position, .. }
            | ParseError::ExpectedToken { position, .. }
            | ParseError::UnexpectedEndOfInput { position, .. }
            | ParseError::UnclosedString { position }
            | ParseError::InvalidEscape { position, .. }
            | ParseError::InvalidNumber { position, .. }
            | ParseError::Unsupported { position, .. }
            | ParseError::MixedLogicalOperators { position }
            | ParseError::NestedPredicate { position } => Some(*position),
        }
    }
}
