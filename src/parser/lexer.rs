//! Lexical analysis utilities

use super::error::{ParseError, ParseResult};
use super::span::Spanned;
use super::tokenizer::Token;
use std::borrow::Cow;

/// Check if a character can start an identifier
pub fn is_identifier_start(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_start(c) || c == '_'
}

/// Check if a character can continue an identifier
pub fn is_identifier_continue(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_continue(c)
}

/// Token stream with lookahead capability
#[derive(Debug)]
pub struct TokenStream<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    position: usize,
    input_len: usize,
}

impl<'input> TokenStream<'input> {
    /// Create a new token stream
    pub fn new(tokens: Vec<Spanned<Token<'input>>>, input_len: usize) -> Self {
        Self {
            tokens,
            position: 0,
            input_len,
        }
    }

    /// Peek at the current token without consuming
    pub fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.position)
    }

    /// Peek at a token n positions ahead
    pub fn peek_ahead(&self, n: usize) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.position + n)
    }

    /// Consume and return the current token
    pub fn next(&mut self) -> Option<Spanned<Token<'input>>> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Check if we're at the end of the stream
    pub fn is_eof(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Byte offset of the current token, or the input length at EOF
    pub fn offset(&self) -> usize {
        self.peek().map(|t| t.start).unwrap_or(self.input_len)
    }

    /// Consume a token if it matches the predicate
    pub fn consume_if<F>(&mut self, predicate: F) -> Option<Spanned<Token<'input>>>
    where
        F: FnOnce(&Token<'input>) -> bool,
    {
        match self.peek() {
            Some(token) if predicate(&token.value) => self.next(),
            _ => None,
        }
    }

    /// Expect a token of the same kind as `expected`
    pub fn expect(
        &mut self,
        expected: Token<'input>,
        description: &'static str,
    ) -> ParseResult<Spanned<Token<'input>>> {
        match self.peek() {
            Some(token) if std::mem::discriminant(&token.value) == std::mem::discriminant(&expected) => {
                self.next().ok_or(ParseError::UnexpectedEndOfInput {
                    expected: Cow::Borrowed(description),
                    position: self.input_len,
                })
            }
            Some(token) => Err(ParseError::ExpectedToken {
                expected: Cow::Owned(format!("{description}, found '{}'", token.value.describe())),
                position: token.start,
            }),
            None => Err(ParseError::UnexpectedEndOfInput {
                expected: Cow::Borrowed(description),
                position: self.input_len,
            }),
        }
    }
}
