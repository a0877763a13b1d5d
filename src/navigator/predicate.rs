//! `where(...)` evaluation against one array element
//!
//! Comparison paths follow collection semantics: a property applied to an
//! array is applied to every element, nulls and empty arrays contribute
//! nothing, and `=` holds when any collected item equals the literal.

use crate::ast::{Comparison, ComparisonOperator, IndexSelector, Literal, Predicate, Step};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Whether `element` satisfies the predicate
pub fn matches(predicate: &Predicate, element: &Value) -> bool {
    match predicate {
        Predicate::Single(comparison) => evaluate(comparison, element),
        Predicate::All(comparisons) => comparisons.iter().all(|c| evaluate(c, element)),
        Predicate::Any(comparisons) => comparisons.iter().any(|c| evaluate(c, element)),
    }
}

/// First element of `items` satisfying the predicate, in array order
pub fn first_match(predicate: &Predicate, items: &[Value]) -> Option<usize> {
    items.iter().position(|item| matches(predicate, item))
}

fn evaluate(comparison: &Comparison, element: &Value) -> bool {
    let collected = collect(element, &comparison.left.steps);
    match (comparison.operator, &comparison.right) {
        (ComparisonOperator::Exists, _) => !collected.is_empty(),
        (ComparisonOperator::Empty, _) => collected.is_empty(),
        (ComparisonOperator::Equals, Some(literal)) => {
            collected.iter().any(|item| literal_equals(item, literal))
        }
        // An empty left side is never unequal to anything
        (ComparisonOperator::NotEquals, Some(literal)) => {
            !collected.is_empty() && !collected.iter().any(|item| literal_equals(item, literal))
        }
        (_, None) => false,
    }
}

/// Flattened values reached by `steps` from `root`
fn collect<'a>(root: &'a Value, steps: &[Step]) -> Vec<&'a Value> {
    let mut current = flatten(vec![root]);
    for step in steps {
        current = match step {
            Step::Property(name) => flatten(
                current
                    .iter()
                    .filter_map(|value| value.as_object().and_then(|o| o.get(name.as_str())))
                    .collect(),
            ),
            Step::Index(IndexSelector::Position(n)) => current.get(*n).copied().into_iter().collect(),
            Step::Index(IndexSelector::Wildcard) => current,
            Step::ResourceTypeFilter(name) => current
                .into_iter()
                .filter(|value| value.get("resourceType").and_then(Value::as_str) == Some(name.as_str()))
                .collect(),
            Step::Predicate(inner) => current
                .into_iter()
                .filter(|value| matches(inner, value))
                .collect(),
        };
        if current.is_empty() {
            break;
        }
    }
    current
}

fn flatten(values: Vec<&Value>) -> Vec<&Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Null => {}
            Value::Array(items) => out.extend(items.iter().filter(|v| !v.is_null())),
            other => out.push(other),
        }
    }
    out
}

fn literal_equals(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (Value::String(s), Literal::String(expected)) => s == expected,
        (Value::Bool(b), Literal::Boolean(expected)) => b == expected,
        (Value::Number(n), Literal::Number(expected)) => {
            number_as_decimal(n).is_some_and(|d| d == *expected)
        }
        _ => false,
    }
}

fn number_as_decimal(number: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = number.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = number.as_u64() {
        return Some(Decimal::from(u));
    }
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
