//! Restricted path expression parser
//!
//! Compiles location strings such as
//! `Observation.component.where(code.coding.code = 'SQ-001').valueString`
//! into a [`PathExpression`](crate::ast::PathExpression). Parse failures are
//! ordinary values: callers treat them as "no AST" and carry on.

pub mod cache;
pub mod error;
pub mod lexer;
pub mod path;
pub mod span;
pub mod tokenizer;

pub use cache::{CacheStats, CachedParse, DEFAULT_PATH_CACHE_CAPACITY, PathCache};
pub use error::{ParseError, ParseResult};
pub use path::{PathParser, parse_path};
pub use span::Spanned;

/// Parse a path string, returning `None` for anything outside the grammar
pub fn try_parse(input: &str) -> Option<crate::ast::PathExpression> {
    parse_path(input).ok()
}
