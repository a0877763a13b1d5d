//! Tokenizer for restricted location paths
//!
//! Byte-oriented scanner producing zero-copy tokens. Operators that belong to
//! full FHIRPath but not to the restricted path grammar (`+`, `|`, `<`, ...)
//! are still recognised so the parser can reject them with a precise
//! position instead of failing on an unknown character.

use super::error::{ParseError, ParseResult};
use super::lexer::{is_identifier_continue, is_identifier_start};
use super::span::Spanned;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Path token
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    /// Identifier, plain or backtick-delimited
    Identifier(&'input str),
    /// Number literal text, optionally negative (e.g. `42`, `-3.5`)
    Number(&'input str),
    /// String literal with escapes processed
    String(Cow<'input, str>),
    /// `true`
    True,
    /// `false`
    False,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor` (recognised only to be rejected)
    Xor,
    /// `implies` (recognised only to be rejected)
    Implies,
    /// `where`
    Where,
    /// `.`
    Dot,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `*`
    Star,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// Any other FHIRPath operator symbol
    Operator(&'input str),
}

impl<'input> Token<'input> {
    /// Get identifier string
    #[inline]
    pub fn as_identifier(&self) -> Option<&'input str> {
        match self {
            Token::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// Short human-readable rendering for error messages
    pub fn describe(&self) -> Cow<'static, str> {
        match self {
            Token::Identifier(s) => Cow::Owned((*s).to_string()),
            Token::Number(s) => Cow::Owned((*s).to_string()),
            Token::String(s) => Cow::Owned(format!("'{s}'")),
            Token::True => Cow::Borrowed("true"),
            Token::False => Cow::Borrowed("false"),
            Token::And => Cow::Borrowed("and"),
            Token::Or => Cow::Borrowed("or"),
            Token::Xor => Cow::Borrowed("xor"),
            Token::Implies => Cow::Borrowed("implies"),
            Token::Where => Cow::Borrowed("where"),
            Token::Dot => Cow::Borrowed("."),
            Token::LeftBracket => Cow::Borrowed("["),
            Token::RightBracket => Cow::Borrowed("]"),
            Token::LeftParen => Cow::Borrowed("("),
            Token::RightParen => Cow::Borrowed(")"),
            Token::Star => Cow::Borrowed("*"),
            Token::Equal => Cow::Borrowed("="),
            Token::NotEqual => Cow::Borrowed("!="),
            Token::Operator(s) => Cow::Owned((*s).to_string()),
        }
    }
}

/// Reserved words
static KEYWORD_TABLE: Lazy<FxHashMap<&'static str, Token<'static>>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("true", Token::True);
    map.insert("false", Token::False);
    map.insert("and", Token::And);
    map.insert("or", Token::Or);
    map.insert("xor", Token::Xor);
    map.insert("implies", Token::Implies);
    map.insert("where", Token::Where);
    map
});

/// Byte scanner over a path string
#[derive(Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
    end: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a new tokenizer
    #[inline]
    pub fn new(input: &'input str) -> Self {
        let bytes = input.as_bytes();
        Self {
            input,
            bytes,
            pos: 0,
            end: bytes.len(),
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    #[inline(always)]
    fn skip_whitespace(&mut self) {
        while self.pos < self.end {
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn parse_identifier(&mut self) -> &'input str {
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if is_identifier_continue(ch) {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn parse_delimited_identifier(&mut self) -> ParseResult<&'input str> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.end {
            if self.bytes[self.pos] == b'`' {
                let content = &self.input[start..self.pos];
                self.pos += 1;
                if content.is_empty() {
                    return Err(ParseError::ExpectedToken {
                        expected: Cow::Borrowed("identifier"),
                        position: start,
                    });
                }
                return Ok(content);
            }
            self.pos += 1;
        }
        Err(ParseError::UnexpectedEndOfInput {
            expected: Cow::Borrowed("closing '`'"),
            position: open,
        })
    }

    fn parse_number(&mut self) -> &'input str {
        let start = self.pos;
        if self.peek_byte(0) == Some(b'-') {
            self.pos += 1;
        }
        while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let is_decimal = self.peek_byte(0) == Some(b'.')
            && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit());
        if is_decimal {
            self.pos += 1;
            while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        &self.input[start..self.pos]
    }

    /// Scan a single-quoted string, processing escapes only when present
    fn parse_string_literal(&mut self) -> ParseResult<Cow<'input, str>> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        let mut owned: Option<String> = None;

        while self.pos < self.end {
            match self.bytes[self.pos] {
                b'\'' => {
                    let result = match owned {
                        Some(s) => Cow::Owned(s),
                        None => Cow::Borrowed(&self.input[start..self.pos]),
                    };
                    self.pos += 1;
                    return Ok(result);
                }
                b'\\' => {
                    let buf = owned.get_or_insert_with(|| self.input[start..self.pos].to_string());
                    let escape_at = self.pos;
                    self.pos += 1;
                    let Some(ch) = self.input[self.pos..].chars().next() else {
                        break;
                    };
                    self.pos += ch.len_utf8();
                    match ch {
                        '\'' => buf.push('\''),
                        '"' => buf.push('"'),
                        '`' => buf.push('`'),
                        '\\' => buf.push('\\'),
                        '/' => buf.push('/'),
                        'n' => buf.push('\n'),
                        't' => buf.push('\t'),
                        'r' => buf.push('\r'),
                        'f' => buf.push('\u{0C}'),
                        'u' => {
                            let hex = self.input.get(self.pos..self.pos + 4).unwrap_or("");
                            let decoded = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
                            match decoded {
                                Some(c) if hex.len() == 4 => {
                                    buf.push(c);
                                    self.pos += 4;
                                }
                                _ => {
                                    return Err(ParseError::InvalidEscape {
                                        sequence: format!("u{hex}"),
                                        position: escape_at,
                                    });
                                }
                            }
                        }
                        other => {
                            return Err(ParseError::InvalidEscape {
                                sequence: other.to_string(),
                                position: escape_at,
                            });
                        }
                    }
                }
                _ => {
                    let ch = self.input[self.pos..].chars().next().unwrap_or('\0');
                    if let Some(buf) = owned.as_mut() {
                        buf.push(ch);
                    }
                    self.pos += ch.len_utf8().max(1);
                }
            }
        }

        Err(ParseError::UnclosedString { position: open })
    }

    fn single(&mut self, token: Token<'input>) -> Token<'input> {
        self.pos += 1;
        token
    }

    fn operator(&mut self, len: usize) -> Token<'input> {
        let start = self.pos;
        self.pos += len;
        Token::Operator(&self.input[start..self.pos])
    }

    /// Produce the next token, or `None` at end of input
    pub fn next_token(&mut self) -> ParseResult<Option<Spanned<Token<'input>>>> {
        self.skip_whitespace();
        if self.pos >= self.end {
            return Ok(None);
        }

        let start = self.pos;
        let token = match self.bytes[self.pos] {
            b'.' => self.single(Token::Dot),
            b'[' => self.single(Token::LeftBracket),
            b']' => self.single(Token::RightBracket),
            b'(' => self.single(Token::LeftParen),
            b')' => self.single(Token::RightParen),
            b'*' => self.single(Token::Star),
            b'=' => match self.peek_byte(1) {
                Some(b'=') | Some(b'>') => self.operator(2),
                _ => self.single(Token::Equal),
            },
            b'!' => match self.peek_byte(1) {
                Some(b'=') => {
                    self.pos += 2;
                    Token::NotEqual
                }
                Some(b'~') => self.operator(2),
                _ => return Err(ParseError::InvalidCharacter { ch: '!', position: start }),
            },
            b'<' | b'>' => match self.peek_byte(1) {
                Some(b'=') => self.operator(2),
                _ => self.operator(1),
            },
            b'-' if self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()) => {
                Token::Number(self.parse_number())
            }
            b'+' | b'-' | b'/' | b'|' | b'&' | b'~' | b',' | b'$' | b'%' | b'{' | b'}' => {
                self.operator(1)
            }
            b'\'' => Token::String(self.parse_string_literal()?),
            b'`' => Token::Identifier(self.parse_delimited_identifier()?),
            b'0'..=b'9' => Token::Number(self.parse_number()),
            _ => {
                let ch = self.current_char().unwrap_or('\0');
                if !is_identifier_start(ch) {
                    return Err(ParseError::InvalidCharacter { ch, position: start });
                }
                let ident = self.parse_identifier();
                match KEYWORD_TABLE.get(ident) {
                    Some(keyword) => keyword.clone(),
                    None => Token::Identifier(ident),
                }
            }
        };

        Ok(Some(Spanned::new(token, start, self.pos)))
    }

    /// Tokenize the whole input
    pub fn tokenize_all(&mut self) -> ParseResult<Vec<Spanned<Token<'input>>>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}
