//! Comparison operators shared by filters and conditional transformations.
//!
//! Ordering operators use a loose comparison: numbers and numeric strings
//! compare numerically, booleans and nulls compare by truthiness, other
//! strings compare lexically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::value::{is_empty_value, numeric_value, parse_numeric_str, string_form, truthy};

/// Predicate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "not_empty")]
    NotEmpty,
    /// Any operator name not listed above; never matches.
    #[serde(rename = "unsupported")]
    #[serde(other)]
    Unsupported,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Empty => "empty",
            Operator::NotEmpty => "not_empty",
            Operator::Unsupported => "unsupported",
        }
    }
}

/// Evaluate `value <operator> compare`. An absent value behaves like `null`.
pub fn evaluate(value: Option<&Value>, operator: Operator, compare: &Value) -> bool {
    let subject = value.unwrap_or(&Value::Null);
    match operator {
        Operator::Eq => loose_eq(subject, compare),
        Operator::Ne => !loose_eq(subject, compare),
        Operator::Gt => loose_compare(subject, compare) == Some(Ordering::Greater),
        Operator::Ge => matches!(
            loose_compare(subject, compare),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => loose_compare(subject, compare) == Some(Ordering::Less),
        Operator::Le => matches!(
            loose_compare(subject, compare),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Contains => string_form(subject).contains(&string_form(compare)),
        Operator::StartsWith => string_form(subject).starts_with(&string_form(compare)),
        Operator::EndsWith => string_form(subject).ends_with(&string_form(compare)),
        Operator::Empty => is_empty_value(value),
        Operator::NotEmpty => !is_empty_value(value),
        Operator::Unsupported => false,
    }
}

pub fn loose_eq(a: &Value, b: &Value) -> bool {
    loose_compare(a, b) == Some(Ordering::Equal)
}

/// Loose ordering of two values; `None` when they are not comparable.
pub fn loose_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::String(s)) => Some("".cmp(s.as_str())),
        (Value::String(s), Value::Null) => Some(s.as_str().cmp("")),
        (Value::Bool(_) | Value::Null, _) | (_, Value::Bool(_) | Value::Null) => {
            Some(truthy(a).cmp(&truthy(b)))
        }
        (Value::Number(_), Value::Number(_)) => numeric_cmp(a, b),
        (Value::Number(_), Value::String(s)) => match parse_numeric_str(s) {
            Some(_) => numeric_cmp(a, b),
            None => Some(string_form(a).as_str().cmp(s.as_str())),
        },
        (Value::String(s), Value::Number(_)) => match parse_numeric_str(s) {
            Some(_) => numeric_cmp(a, b),
            None => Some(s.as_str().cmp(string_form(b).as_str())),
        },
        (Value::String(x), Value::String(y)) => {
            match (parse_numeric_str(x), parse_numeric_str(y)) {
                (Some(_), Some(_)) => numeric_cmp(a, b),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Array(x), Value::Array(y)) => match x.len().cmp(&y.len()) {
            Ordering::Equal => x
                .iter()
                .zip(y)
                .map(|(l, r)| loose_compare(l, r))
                .find(|ord| *ord != Some(Ordering::Equal))
                .unwrap_or(Some(Ordering::Equal)),
            other => Some(other),
        },
        (Value::Object(x), Value::Object(y)) => match x.len().cmp(&y.len()) {
            Ordering::Equal => {
                for (key, left) in x {
                    match y.get(key).and_then(|right| loose_compare(left, right)) {
                        Some(Ordering::Equal) => continue,
                        other => return other,
                    }
                }
                Some(Ordering::Equal)
            }
            other => Some(other),
        },
        // containers sort after scalars
        (Value::Array(_) | Value::Object(_), _) => Some(Ordering::Greater),
        (_, Value::Array(_) | Value::Object(_)) => Some(Ordering::Less),
    }
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    numeric_value(a)?.partial_cmp(&numeric_value(b)?)
}
