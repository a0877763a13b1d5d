//! Recursive-descent parser for the restricted path grammar
//!
//! ```text
//! path        = [resourceType "."] step *("." step)
//! step        = identifier [indexer] [predicate]
//! indexer     = "[" (digit+ | "*") "]"
//! predicate   = "where(" comparison *((" and " / " or ") comparison) ")"
//! comparison  = relpath "=" literal | relpath ".exists()" | relpath ".empty()"
//! literal     = quotedString | number | "true" | "false"
//! ```
//!
//! A leading `Bundle.entry[n].resource` is folded into
//! [`PathExpression::entry_hint`]. Everything outside the grammar (function
//! calls, arithmetic, type operators, nested or repeated `where`, mixed
//! `and`/`or`) is a [`ParseError`], never a best-effort guess.

use super::error::{ParseError, ParseResult};
use super::lexer::TokenStream;
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{
    Comparison, ComparisonOperator, IndexSelector, Literal, PathExpression, Predicate,
    RelativePath, Step,
};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::str::FromStr;

/// Parse a path string into a [`PathExpression`]
pub fn parse_path(input: &str) -> ParseResult<PathExpression> {
    if input.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let tokens = Tokenizer::new(input).tokenize_all()?;
    PathParser::new(TokenStream::new(tokens, input.len())).parse()
}

/// Words that are FHIRPath operators but have no place in a location path
const WORD_OPERATORS: &[&str] = &["is", "as", "in", "contains", "div", "mod", "not"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    And,
    Or,
}

/// Parser state over a token stream
pub struct PathParser<'input> {
    stream: TokenStream<'input>,
    seen_predicate: bool,
}

impl<'input> PathParser<'input> {
    /// Create a parser over an already tokenized input
    pub fn new(stream: TokenStream<'input>) -> Self {
        Self {
            stream,
            seen_predicate: false,
        }
    }

    /// Parse the whole stream
    pub fn parse(mut self) -> ParseResult<PathExpression> {
        let mut steps: SmallVec<[Step; 8]> = SmallVec::new();
        let mut entry_hint = None;

        if matches!(self.peek_token(), Some(Token::Where)) {
            return Err(ParseError::Unsupported {
                construct: Cow::Borrowed("where() without a collection"),
                position: self.stream.offset(),
            });
        }
        let (first, position) = self.expect_identifier()?;
        self.reject_call(first, position)?;

        if is_resource_type(first) {
            if matches!(self.peek_token(), Some(Token::LeftBracket)) {
                return Err(ParseError::Unsupported {
                    construct: Cow::Borrowed("indexer on a resource type"),
                    position: self.stream.offset(),
                });
            }
            let hint = if first == "Bundle" {
                self.try_entry_hint()?
            } else {
                None
            };
            match hint {
                Some(index) => entry_hint = Some(index),
                None => steps.push(Step::ResourceTypeFilter(first.to_string())),
            }
        } else {
            steps.push(Step::Property(first.to_string()));
            self.parse_indexer(&mut steps)?;
        }

        while let Some(token) = self.stream.peek() {
            let position = token.start;
            match &token.value {
                Token::Dot => {
                    self.stream.next();
                }
                other => return Err(Self::unexpected_after_step(other, position)),
            }

            match self.peek_token() {
                Some(Token::Where) => {
                    if steps.is_empty() && entry_hint.is_none() {
                        return Err(ParseError::Unsupported {
                            construct: Cow::Borrowed("where() without a collection"),
                            position: self.stream.offset(),
                        });
                    }
                    let predicate = self.parse_predicate()?;
                    steps.push(Step::Predicate(predicate));
                    if matches!(self.peek_token(), Some(Token::LeftBracket)) {
                        return Err(ParseError::Unsupported {
                            construct: Cow::Borrowed("indexer after where()"),
                            position: self.stream.offset(),
                        });
                    }
                }
                _ => {
                    let (name, position) = self.expect_identifier()?;
                    self.reject_call(name, position)?;
                    steps.push(Step::Property(name.to_string()));
                    self.parse_indexer(&mut steps)?;
                }
            }
        }

        Ok(PathExpression { entry_hint, steps })
    }

    fn peek_token(&self) -> Option<&Token<'input>> {
        self.stream.peek().map(|t| &t.value)
    }

    fn peek_token_ahead(&self, n: usize) -> Option<&Token<'input>> {
        self.stream.peek_ahead(n).map(|t| &t.value)
    }

    fn expect_identifier(&mut self) -> ParseResult<(&'input str, usize)> {
        let position = self.stream.offset();
        match self.stream.next() {
            Some(token) => match token.value {
                Token::Identifier(name) => Ok((name, token.start)),
                Token::Where => Err(ParseError::NestedPredicate { position }),
                Token::LeftParen => Err(ParseError::Unsupported {
                    construct: Cow::Borrowed("grouping parentheses"),
                    position,
                }),
                other => Err(ParseError::ExpectedToken {
                    expected: Cow::Owned(format!("identifier, found '{}'", other.describe())),
                    position,
                }),
            },
            None => Err(ParseError::UnexpectedEndOfInput {
                expected: Cow::Borrowed("identifier"),
                position,
            }),
        }
    }

    /// Identifiers followed by `(` are function calls, which the grammar excludes
    fn reject_call(&self, name: &str, position: usize) -> ParseResult<()> {
        if matches!(self.peek_token(), Some(Token::LeftParen)) {
            return Err(ParseError::Unsupported {
                construct: Cow::Owned(format!("function '{name}()'")),
                position,
            });
        }
        Ok(())
    }

    fn unexpected_after_step(token: &Token<'input>, position: usize) -> ParseError {
        match token {
            Token::Operator(_)
            | Token::Equal
            | Token::NotEqual
            | Token::Star
            | Token::And
            | Token::Or
            | Token::Xor
            | Token::Implies => ParseError::Unsupported {
                construct: Cow::Owned(format!("operator '{}'", token.describe())),
                position,
            },
            Token::Identifier(word) if WORD_OPERATORS.contains(word) => ParseError::Unsupported {
                construct: Cow::Owned(format!("operator '{word}'")),
                position,
            },
            other => ParseError::ExpectedToken {
                expected: Cow::Owned(format!("'.', found '{}'", other.describe())),
                position,
            },
        }
    }

    /// Fold `Bundle.entry[n].resource` into an entry hint
    ///
    /// Called right after the `Bundle` token; consumes nothing unless the
    /// whole prefix matches.
    fn try_entry_hint(&mut self) -> ParseResult<Option<usize>> {
        let shape = (
            self.peek_token_ahead(0),
            self.peek_token_ahead(1),
            self.peek_token_ahead(2),
            self.peek_token_ahead(3),
            self.peek_token_ahead(4),
            self.peek_token_ahead(5),
            self.peek_token_ahead(6),
        );
        let index = match shape {
            (
                Some(Token::Dot),
                Some(Token::Identifier("entry")),
                Some(Token::LeftBracket),
                Some(Token::Number(digits)),
                Some(Token::RightBracket),
                Some(Token::Dot),
                Some(Token::Identifier("resource")),
            ) => match digits.parse::<usize>() {
                Ok(index) => index,
                Err(_) => return Ok(None),
            },
            _ => return Ok(None),
        };
        if matches!(self.peek_token_ahead(7), Some(Token::LeftBracket | Token::LeftParen)) {
            return Ok(None);
        }
        for _ in 0..7 {
            self.stream.next();
        }
        Ok(Some(index))
    }

    fn parse_indexer(&mut self, steps: &mut SmallVec<[Step; 8]>) -> ParseResult<()> {
        if self.stream.consume_if(|t| matches!(t, Token::LeftBracket)).is_none() {
            return Ok(());
        }
        let position = self.stream.offset();
        let selector = match self.stream.next() {
            Some(token) => match token.value {
                Token::Star => IndexSelector::Wildcard,
                Token::Number(digits) => match digits.parse::<usize>() {
                    Ok(index) => IndexSelector::Position(index),
                    Err(_) => {
                        return Err(ParseError::ExpectedToken {
                            expected: Cow::Owned(format!(
                                "non-negative integer index, found '{digits}'"
                            )),
                            position,
                        });
                    }
                },
                other => {
                    return Err(ParseError::ExpectedToken {
                        expected: Cow::Owned(format!(
                            "index or '*', found '{}'",
                            other.describe()
                        )),
                        position,
                    });
                }
            },
            None => {
                return Err(ParseError::UnexpectedEndOfInput {
                    expected: Cow::Borrowed("index or '*'"),
                    position,
                });
            }
        };
        self.stream.expect(Token::RightBracket, "']'")?;
        steps.push(Step::Index(selector));
        Ok(())
    }

    fn parse_predicate(&mut self) -> ParseResult<Predicate> {
        let position = self.stream.offset();
        if self.seen_predicate {
            return Err(ParseError::NestedPredicate { position });
        }
        self.seen_predicate = true;
        self.stream.expect(Token::Where, "'where'")?;
        self.stream.expect(Token::LeftParen, "'('")?;

        let mut comparisons = vec![self.parse_comparison()?];
        let mut join: Option<Join> = None;

        loop {
            let Some(token) = self.stream.peek() else {
                return Err(ParseError::UnexpectedEndOfInput {
                    expected: Cow::Borrowed("')'"),
                    position: self.stream.offset(),
                });
            };
            let position = token.start;
            let next_join = match &token.value {
                Token::RightParen => break,
                Token::And => Join::And,
                Token::Or => Join::Or,
                other => return Err(Self::unexpected_in_predicate(other, position)),
            };
            match join {
                Some(existing) if existing != next_join => {
                    return Err(ParseError::MixedLogicalOperators { position });
                }
                _ => join = Some(next_join),
            }
            self.stream.next();
            comparisons.push(self.parse_comparison()?);
        }
        self.stream.expect(Token::RightParen, "')'")?;

        Ok(match join {
            None => {
                let single = comparisons.pop().ok_or(ParseError::ExpectedToken {
                    expected: Cow::Borrowed("comparison"),
                    position,
                })?;
                Predicate::Single(single)
            }
            Some(Join::And) => Predicate::All(comparisons),
            Some(Join::Or) => Predicate::Any(comparisons),
        })
    }

    fn unexpected_in_predicate(token: &Token<'input>, position: usize) -> ParseError {
        match token {
            Token::Xor | Token::Implies | Token::Operator(_) => ParseError::Unsupported {
                construct: Cow::Owned(format!("operator '{}'", token.describe())),
                position,
            },
            Token::Identifier(word) if WORD_OPERATORS.contains(word) => ParseError::Unsupported {
                construct: Cow::Owned(format!("operator '{word}'")),
                position,
            },
            Token::LeftParen => ParseError::Unsupported {
                construct: Cow::Borrowed("grouping parentheses"),
                position,
            },
            Token::Where => ParseError::NestedPredicate { position },
            other => ParseError::ExpectedToken {
                expected: Cow::Owned(format!("'and', 'or' or ')', found '{}'", other.describe())),
                position,
            },
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<Comparison> {
        let mut steps: SmallVec<[Step; 8]> = SmallVec::new();
        let (first, position) = self.expect_identifier()?;
        self.reject_call(first, position)?;
        steps.push(Step::Property(first.to_string()));
        self.parse_indexer(&mut steps)?;

        loop {
            let Some(token) = self.stream.peek() else {
                return Err(ParseError::UnexpectedEndOfInput {
                    expected: Cow::Borrowed("'=', '!=', '.exists()' or '.empty()'"),
                    position: self.stream.offset(),
                });
            };
            let position = token.start;
            match &token.value {
                Token::Dot => {
                    if let Some(operator) = self.try_existence_call()? {
                        return Ok(Comparison {
                            left: RelativePath {
                                steps: steps.into_vec(),
                            },
                            operator,
                            right: None,
                        });
                    }
                    self.stream.next();
                    let (name, position) = self.expect_identifier()?;
                    self.reject_call(name, position)?;
                    steps.push(Step::Property(name.to_string()));
                    self.parse_indexer(&mut steps)?;
                }
                Token::Equal | Token::NotEqual => {
                    let operator = if matches!(token.value, Token::Equal) {
                        ComparisonOperator::Equals
                    } else {
                        ComparisonOperator::NotEquals
                    };
                    self.stream.next();
                    let literal = self.parse_literal()?;
                    return Ok(Comparison {
                        left: RelativePath {
                            steps: steps.into_vec(),
                        },
                        operator,
                        right: Some(literal),
                    });
                }
                other => return Err(Self::unexpected_in_predicate(other, position)),
            }
        }
    }

    /// Recognise `.exists()` / `.empty()` at the current `.` token
    fn try_existence_call(&mut self) -> ParseResult<Option<ComparisonOperator>> {
        let operator = match (self.peek_token_ahead(1), self.peek_token_ahead(2)) {
            (Some(Token::Identifier("exists")), Some(Token::LeftParen)) => ComparisonOperator::Exists,
            (Some(Token::Identifier("empty")), Some(Token::LeftParen)) => ComparisonOperator::Empty,
            _ => return Ok(None),
        };
        self.stream.next();
        self.stream.next();
        self.stream.next();
        self.stream.expect(Token::RightParen, "')' (exists()/empty() take no arguments)")?;
        Ok(Some(operator))
    }

    fn parse_literal(&mut self) -> ParseResult<Literal> {
        let position = self.stream.offset();
        let Some(token) = self.stream.next() else {
            return Err(ParseError::UnexpectedEndOfInput {
                expected: Cow::Borrowed("literal"),
                position,
            });
        };
        match token.value {
            Token::String(value) => Ok(Literal::String(value.into_owned())),
            Token::True => Ok(Literal::Boolean(true)),
            Token::False => Ok(Literal::Boolean(false)),
            Token::Number(text) => Decimal::from_str(text)
                .map(Literal::Number)
                .map_err(|_| ParseError::InvalidNumber {
                    text: text.to_string(),
                    position,
                }),
            Token::Identifier(name) => Err(ParseError::Unsupported {
                construct: Cow::Owned(format!("path '{name}' on the right-hand side")),
                position,
            }),
            other => Err(ParseError::ExpectedToken {
                expected: Cow::Owned(format!("literal, found '{}'", other.describe())),
                position,
            }),
        }
    }
}

/// A leading identifier with an upper-case initial names a resource type
fn is_resource_type(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}
