//! Value helpers shared by transformations, filters and the CSV emitter.

use serde_json::{Number, Value};

/// Text form of a value as it appears in a CSV cell.
///
/// `null` is empty, integral floats drop the trailing `.0`, containers are
/// written as compact JSON.
pub fn string_form(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_string(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// [`string_form`] where absence reads as `null`.
pub fn opt_string_form(value: Option<&Value>) -> String {
    value.map(string_form).unwrap_or_default()
}

fn number_string(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{}", f as i64);
            }
            return format!("{}", f);
        }
    }
    n.to_string()
}

/// Null, absent, empty string or empty container.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Numeric reading of a number or a numeric string.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_str(s),
        _ => None,
    }
}

/// Parse strings such as `"42"`, `" -1.5 "`, `"1e3"` or `".5"`.
pub fn parse_numeric_str(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Boolean reading: null, `false`, zero, `""`, `"0"` and empty containers are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// JSON number for an arithmetic result: integral values stay integers.
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::Number((f as i64).into())
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_form() {
        assert_eq!(string_form(&Value::Null), "");
        assert_eq!(string_form(&json!(true)), "true");
        assert_eq!(string_form(&json!(30)), "30");
        assert_eq!(string_form(&json!(2.0)), "2");
        assert_eq!(string_form(&json!(2.25)), "2.25");
        assert_eq!(string_form(&json!("Ann")), "Ann");
        assert_eq!(string_form(&json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&json!(""))));
        assert!(is_empty_value(Some(&json!({}))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!(" "))));
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(numeric_value(&json!(" 12 ")), Some(12.0));
        assert_eq!(numeric_value(&json!("-1.5e2")), Some(-150.0));
        assert_eq!(numeric_value(&json!(".5")), Some(0.5));
        assert_eq!(numeric_value(&json!("12abc")), None);
        assert_eq!(numeric_value(&json!("inf")), None);
        assert_eq!(numeric_value(&json!(true)), None);
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(4.0), json!(4));
        assert_eq!(number_value(0.5), json!(0.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }
}
