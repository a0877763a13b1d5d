//! Abstract Syntax Tree for restricted location paths
//!
//! A [`PathExpression`] is the compiled form of strings such as
//! `Observation.component.where(code.coding.code = 'SQ-001').valueString`.
//! Nodes are plain owned data: they are `Clone + Eq + Hash` so that parsed
//! expressions can be cached process-wide and compared structurally.

use rust_decimal::Decimal;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Compiled location path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathExpression {
    /// Explicit bundle entry addressed by a leading `Bundle.entry[n].resource`
    pub entry_hint: Option<usize>,
    /// Navigation steps in source order
    pub steps: SmallVec<[Step; 8]>,
}

/// One navigation step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Step {
    /// Object property access (`name`)
    Property(String),
    /// Array element access (`[0]` or `[*]`)
    Index(IndexSelector),
    /// Leading resource type token (`Observation`)
    ResourceTypeFilter(String),
    /// `where(...)` filter over array elements
    Predicate(Predicate),
}

/// Array indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexSelector {
    /// Zero-based position
    Position(usize),
    /// `*`
    Wildcard,
}

/// Flat boolean combination of comparisons
///
/// Mixed `and`/`or` chains are rejected by the parser, so a predicate is
/// always homogeneous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "join", content = "comparisons", rename_all = "camelCase")]
pub enum Predicate {
    /// A single comparison
    Single(Comparison),
    /// Every comparison must hold
    All(Vec<Comparison>),
    /// At least one comparison must hold
    Any(Vec<Comparison>),
}

impl Predicate {
    /// Comparisons in source order
    pub fn comparisons(&self) -> &[Comparison] {
        match self {
            Predicate::Single(c) => std::slice::from_ref(c),
            Predicate::All(cs) | Predicate::Any(cs) => cs,
        }
    }
}

/// `left operator right` inside a predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Path relative to the array element under test
    pub left: RelativePath,
    /// Comparison kind
    pub operator: ComparisonOperator,
    /// Literal operand, absent for `exists()`/`empty()`
    pub right: Option<Literal>,
}

/// Relative path made of property and index steps only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelativePath {
    /// Steps relative to the element under test
    pub steps: Vec<Step>,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `.exists()`
    Exists,
    /// `.empty()`
    Empty,
}

/// Literal operand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Literal {
    /// Quoted string, escapes already processed
    String(String),
    /// Integer or decimal number
    Number(Decimal),
    /// `true` / `false`
    Boolean(bool),
}

impl PathExpression {
    /// Leading resource type token, if any
    pub fn resource_type(&self) -> Option<&str> {
        match self.steps.first() {
            Some(Step::ResourceTypeFilter(name)) => Some(name),
            _ => None,
        }
    }

    /// Number of steps, not counting the entry hint
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the expression has no steps and no entry hint
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.entry_hint.is_none()
    }

    /// Render the steps starting at `from` as ordered descriptors
    ///
    /// An index step is glued to its property when the property is part of
    /// the rendered range, so `component`, `[0]` renders as `component[0]`.
    pub fn describe_from(&self, from: usize) -> Vec<String> {
        describe_steps(&self.steps[from.min(self.steps.len())..])
    }
}

/// Render a run of steps as descriptors, gluing indexers to their property
pub fn describe_steps(steps: &[Step]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(steps.len());
    let mut glue = false;
    for step in steps {
        match step {
            Step::Index(selector) if glue => {
                if let Some(last) = out.last_mut() {
                    last.push_str(&selector.to_string());
                }
                glue = false;
            }
            Step::Property(_) => {
                out.push(step.to_string());
                glue = true;
            }
            other => {
                out.push(other.to_string());
                glue = false;
            }
        }
    }
    out
}

impl fmt::Display for IndexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexSelector::Position(n) => write!(f, "[{n}]"),
            IndexSelector::Wildcard => write!(f, "[*]"),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Property(name) | Step::ResourceTypeFilter(name) => write!(f, "{name}"),
            Step::Index(selector) => write!(f, "{selector}"),
            Step::Predicate(predicate) => write!(f, "where({predicate})"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = match self {
            Predicate::Any(_) => " or ",
            _ => " and ",
        };
        let rendered: Vec<String> = self.comparisons().iter().map(|c| c.to_string()).collect();
        write!(f, "{}", rendered.join(join))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.left)?;
        match (&self.operator, &self.right) {
            (ComparisonOperator::Equals, Some(lit)) => write!(f, " = {lit}"),
            (ComparisonOperator::NotEquals, Some(lit)) => write!(f, " != {lit}"),
            (ComparisonOperator::Exists, _) => write!(f, ".exists()"),
            (ComparisonOperator::Empty, _) => write!(f, ".empty()"),
            (_, None) => Ok(()),
        }
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Index(_) => write!(f, "{step}")?,
                _ if i == 0 => write!(f, "{step}")?,
                _ => write!(f, ".{step}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(n) = self.entry_hint {
            write!(f, "Bundle.entry[{n}].resource")?;
            first = false;
        }
        for step in &self.steps {
            match step {
                Step::Index(_) => write!(f, "{step}")?,
                _ if first => write!(f, "{step}")?,
                _ => write!(f, ".{step}")?,
            }
            first = false;
        }
        Ok(())
    }
}
