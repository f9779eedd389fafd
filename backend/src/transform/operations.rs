//! Per-column transformations.
//!
//! A transformation turns the value extracted for one CSV column into the
//! cell value, with the full source record available as context.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;

use super::expr::{evaluate_callback, FUNCTIONS};
use super::extract::extract_value;
use super::predicate::{evaluate, Operator};
use super::value::{is_empty_value, numeric_value, opt_string_form, string_form};

/// Largest precision honoured by `format_number`.
pub const MAX_DECIMALS: usize = 20;

/// All available transformations, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformationSpec {
    /// Reformat a date/time string
    FormatDate {
        #[serde(default = "default_date_format")]
        format: String,
    },

    /// Fixed-point number formatting
    FormatNumber {
        #[serde(default = "default_decimals")]
        decimals: usize,
        #[serde(default = "default_decimal_point")]
        decimal_point: String,
        #[serde(default = "default_thousands_separator")]
        thousands_separator: String,
    },

    /// Change letter case
    StringCase {
        #[serde(default)]
        case: CaseKind,
    },

    /// Join several record fields
    Concat {
        #[serde(default)]
        fields: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// First matching condition decides the value
    Conditional {
        #[serde(default)]
        conditions: Vec<Condition>,
        #[serde(default)]
        default: Option<Value>,
    },

    /// Literal search and replace
    Replace {
        #[serde(default)]
        search: Replacement,
        #[serde(default)]
        replace: Replacement,
    },

    /// Cut long strings and append `...`
    Truncate {
        #[serde(default = "default_truncate_length")]
        length: usize,
    },

    /// Sandboxed expression, see [`super::expr`]
    Callback {
        #[serde(default, alias = "expression")]
        function: String,
    },

    /// Passthrough
    None,

    /// Unrecognised `type`; passthrough
    #[serde(other)]
    Unknown,
}

/// Case conversions for `string_case`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    Upper,
    #[default]
    Lower,
    Title,
    Sentence,
    /// Unknown case names leave the string as-is
    #[serde(other)]
    Unchanged,
}

/// One branch of a `conditional` transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    /// Value to emit; the original value when omitted
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Search or replace argument: one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Replacement {
    One(String),
    Many(Vec<String>),
}

impl Default for Replacement {
    fn default() -> Self {
        Replacement::One(String::new())
    }
}

fn default_date_format() -> String {
    "Y-m-d".to_string()
}

fn default_decimals() -> usize {
    2
}

fn default_decimal_point() -> String {
    ".".to_string()
}

fn default_thousands_separator() -> String {
    ",".to_string()
}

fn default_separator() -> String {
    " ".to_string()
}

fn default_truncate_length() -> usize {
    50
}

impl TransformationSpec {
    /// Transformation name as written in configuration documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            TransformationSpec::FormatDate { .. } => "format_date",
            TransformationSpec::FormatNumber { .. } => "format_number",
            TransformationSpec::StringCase { .. } => "string_case",
            TransformationSpec::Concat { .. } => "concat",
            TransformationSpec::Conditional { .. } => "conditional",
            TransformationSpec::Replace { .. } => "replace",
            TransformationSpec::Truncate { .. } => "truncate",
            TransformationSpec::Callback { .. } => "callback",
            TransformationSpec::None => "none",
            TransformationSpec::Unknown => "unknown",
        }
    }

    /// Apply this transformation to an extracted value.
    ///
    /// `record` is the untouched source record, used by `concat` and
    /// `callback`. An absent value is treated like `null`.
    pub fn apply(&self, value: Option<&Value>, record: &Value) -> Value {
        match self {
            TransformationSpec::FormatDate { format } => self.apply_format_date(value, format),
            TransformationSpec::FormatNumber {
                decimals,
                decimal_point,
                thousands_separator,
            } => self.apply_format_number(value, *decimals, decimal_point, thousands_separator),
            TransformationSpec::StringCase { case } => self.apply_string_case(value, *case),
            TransformationSpec::Concat { fields, separator } => {
                self.apply_concat(record, fields, separator)
            }
            TransformationSpec::Conditional {
                conditions,
                default,
            } => self.apply_conditional(value, conditions, default.as_ref()),
            TransformationSpec::Replace { search, replace } => {
                self.apply_replace(value, search, replace)
            }
            TransformationSpec::Truncate { length } => self.apply_truncate(value, *length),
            TransformationSpec::Callback { function } => {
                self.apply_callback(value, function, record)
            }
            TransformationSpec::None | TransformationSpec::Unknown => {
                value.cloned().unwrap_or(Value::Null)
            }
        }
    }

    fn apply_format_date(&self, value: Option<&Value>, format: &str) -> Value {
        if is_empty_value(value) {
            return Value::String(String::new());
        }
        let original = opt_string_form(value);
        let formatted = parse_datetime(&original).and_then(|date| format_datetime(&date, format));
        Value::String(formatted.unwrap_or(original))
    }

    fn apply_format_number(
        &self,
        value: Option<&Value>,
        decimals: usize,
        decimal_point: &str,
        thousands_separator: &str,
    ) -> Value {
        match value.and_then(numeric_value) {
            Some(n) => Value::String(format_number(n, decimals, decimal_point, thousands_separator)),
            None => Value::String(opt_string_form(value)),
        }
    }

    fn apply_string_case(&self, value: Option<&Value>, case: CaseKind) -> Value {
        let s = opt_string_form(value);
        let converted = match case {
            CaseKind::Upper => s.to_uppercase(),
            CaseKind::Lower => s.to_lowercase(),
            CaseKind::Title => title_case(&s),
            CaseKind::Sentence => upper_first(&s.to_lowercase()),
            CaseKind::Unchanged => s,
        };
        Value::String(converted)
    }

    fn apply_concat(&self, record: &Value, fields: &[String], separator: &str) -> Value {
        let parts: Vec<String> = fields
            .iter()
            .map(|path| extract_value(record, path))
            .filter(|v| !is_empty_value(*v))
            .map(opt_string_form)
            .collect();
        Value::String(parts.join(separator))
    }

    fn apply_conditional(
        &self,
        value: Option<&Value>,
        conditions: &[Condition],
        default: Option<&Value>,
    ) -> Value {
        let original = || value.cloned().unwrap_or(Value::Null);
        conditions
            .iter()
            .find(|c| evaluate(value, c.operator, &c.value))
            .map(|c| c.result.clone().unwrap_or_else(original))
            .or_else(|| default.cloned())
            .unwrap_or_else(original)
    }

    fn apply_replace(&self, value: Option<&Value>, search: &Replacement, replace: &Replacement) -> Value {
        let mut s = opt_string_form(value);
        match search {
            Replacement::One(needle) => {
                let with = match replace {
                    Replacement::One(r) => r.as_str(),
                    Replacement::Many(list) => list.first().map(String::as_str).unwrap_or(""),
                };
                if !needle.is_empty() {
                    s = s.replace(needle.as_str(), with);
                }
            }
            Replacement::Many(needles) => {
                for (i, needle) in needles.iter().enumerate() {
                    if needle.is_empty() {
                        continue;
                    }
                    let with = match replace {
                        Replacement::One(r) => r.as_str(),
                        Replacement::Many(list) => list.get(i).map(String::as_str).unwrap_or(""),
                    };
                    s = s.replace(needle.as_str(), with);
                }
            }
        }
        Value::String(s)
    }

    fn apply_truncate(&self, value: Option<&Value>, length: usize) -> Value {
        let s = opt_string_form(value);
        if s.chars().count() <= length {
            return Value::String(s);
        }
        let mut cut: String = s.chars().take(length).collect();
        cut.push_str("...");
        Value::String(cut)
    }

    fn apply_callback(&self, value: Option<&Value>, function: &str, record: &Value) -> Value {
        evaluate_callback(function, value, record)
            .unwrap_or_else(|err| Value::String(format!("ERROR: {}", err)))
    }
}

// =============================================================================
// Formatting helpers
// =============================================================================

/// Upper-case the first letter of every whitespace separated word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fixed-point formatting with half-away-from-zero rounding.
///
/// Rounding works on the shortest decimal representation of `n`, so
/// `2.675` rounds to `2.68`.
pub fn format_number(n: f64, decimals: usize, decimal_point: &str, thousands_separator: &str) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let decimals = decimals.min(MAX_DECIMALS);
    let repr = format!("{}", n.abs());
    let (int_repr, frac_repr) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int_repr
        .bytes()
        .chain(frac_repr.bytes().chain(std::iter::repeat(b'0')).take(decimals))
        .map(|b| b - b'0')
        .collect();

    if frac_repr.as_bytes().get(decimals).is_some_and(|d| *d >= b'5') {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - decimals;
    let int_part: String = digits[..split].iter().map(|d| char::from(b'0' + d)).collect();
    let frac_part: String = digits[split..].iter().map(|d| char::from(b'0' + d)).collect();

    let mut out = String::new();
    if n < 0.0 && digits.iter().any(|d| *d != 0) {
        out.push('-');
    }
    out.push_str(&group_thousands(&int_part, thousands_separator));
    if decimals > 0 {
        out.push_str(decimal_point);
        out.push_str(&frac_part);
    }
    out
}

fn group_thousands(int_part: &str, separator: &str) -> String {
    if separator.is_empty() || int_part.len() <= 3 {
        return int_part.to_string();
    }
    let mut out = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%m-%Y", "%B %d, %Y", "%b %d, %Y",
    "%d %B %Y",
];

/// Parse the date/time notations accepted by `format_date`.
///
/// Values without an offset are read as UTC.
pub(crate) fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(ts) = s.strip_prefix('@') {
        return ts
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.fixed_offset());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc().fixed_offset());
        }
    }
    None
}

/// Render a date with a PHP-style pattern (`Y-m-d H:i`) or a strftime one (`%d/%m/%Y`).
///
/// `None` when the pattern cannot be rendered.
pub fn format_datetime(date: &DateTime<FixedOffset>, format: &str) -> Option<String> {
    let pattern = if is_strftime(format) {
        format.to_string()
    } else {
        php_to_strftime(format)
    };
    let mut out = String::new();
    write!(out, "{}", date.format(&pattern)).ok()?;
    Some(out)
}

/// A `%` directive such as `%d`, `%-m` or `%:z` marks a strftime pattern.
fn is_strftime(format: &str) -> bool {
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' && chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || "-_0:.+#%".contains(*n)) {
            return true;
        }
    }
    false
}

fn php_letter(c: char) -> Option<&'static str> {
    Some(match c {
        'd' => "%d",
        'D' => "%a",
        'j' => "%-d",
        'l' => "%A",
        'N' => "%u",
        'w' => "%w",
        'W' => "%V",
        'F' => "%B",
        'M' => "%b",
        'm' => "%m",
        'n' => "%-m",
        'o' => "%G",
        'Y' => "%Y",
        'y' => "%y",
        'a' => "%P",
        'A' => "%p",
        'g' => "%-I",
        'G' => "%-H",
        'h' => "%I",
        'H' => "%H",
        'i' => "%M",
        's' => "%S",
        'u' => "%6f",
        'v' => "%3f",
        'e' | 'T' => "%Z",
        'P' => "%:z",
        'O' => "%z",
        'c' => "%Y-%m-%dT%H:%M:%S%:z",
        'r' => "%a, %d %b %Y %H:%M:%S %z",
        'U' => "%s",
        _ => return None,
    })
}

fn php_to_strftime(format: &str) -> String {
    let mut out = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let literal = match c {
            '\\' => match chars.next() {
                Some(escaped) => escaped,
                None => break,
            },
            other => match php_letter(other) {
                Some(spec) => {
                    out.push_str(spec);
                    continue;
                }
                None => other,
            },
        };
        if literal == '%' {
            out.push_str("%%");
        } else {
            out.push(literal);
        }
    }
    out
}

/// Human readable summary of the transformation types, for the CLI.
pub fn operations_description() -> String {
    let mut desc = String::from("Available transformations:\n\n");
    let entries: &[(&str, &str)] = &[
        ("format_date", "Reformat a date. Params: format (PHP letters or %-pattern, default \"Y-m-d\")"),
        ("format_number", "Fixed-point number. Params: decimals (2), decimal_point (\".\"), thousands_separator (\",\")"),
        ("string_case", "Change case. Params: case = upper | lower | title | sentence"),
        ("concat", "Join record fields. Params: fields (list of paths), separator (\" \")"),
        ("conditional", "First matching condition wins. Params: conditions [{operator, value, return}], default"),
        ("replace", "Literal replace. Params: search (string or list), replace (string or list)"),
        ("truncate", "Cut to N characters and append \"...\". Params: length (50)"),
        ("callback", "Sandboxed expression. Params: function, e.g. \"value * 1.2\""),
        ("none", "Passthrough"),
    ];
    for (name, help) in entries {
        let _ = writeln!(desc, "  {:<14} {}", name, help);
    }
    desc.push_str("\nOperators: == != > >= < <= contains starts_with ends_with empty not_empty\n");
    let _ = writeln!(desc, "Callback functions: {}", FUNCTIONS.join(", "));
    desc
}
