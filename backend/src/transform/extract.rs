//! Field path resolution against a single record.

use serde_json::Value;

/// Resolve a dotted field path against a record.
///
/// Every segment must name a key of an object; arrays are never indexed so
/// `items.0` is absent even when `items` is a list.
pub fn extract_value<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if !path.contains('.') {
        return record.as_object().and_then(|obj| obj.get(path));
    }

    path.split('.')
        .try_fold(record, |current, key| current.as_object()?.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_key() {
        let record = json!({"name": "Ann", "nothing": null});
        assert_eq!(extract_value(&record, "name"), Some(&json!("Ann")));
        assert_eq!(extract_value(&record, "nothing"), Some(&Value::Null));
        assert_eq!(extract_value(&record, "missing"), None);
    }

    #[test]
    fn test_nested_path() {
        let record = json!({"user": {"address": {"city": "Oslo"}}});
        assert_eq!(extract_value(&record, "user.address.city"), Some(&json!("Oslo")));
        assert_eq!(extract_value(&record, "user.address.zip"), None);
        assert_eq!(extract_value(&record, "user.address.city.more"), None);
    }

    #[test]
    fn test_no_array_traversal() {
        let record = json!({"items": [{"price": 3}]});
        assert_eq!(extract_value(&record, "items.price"), None);
        assert_eq!(extract_value(&record, "items.0"), None);
        assert_eq!(extract_value(&record, "items.0.price"), None);
    }

    #[test]
    fn test_non_object_record() {
        assert_eq!(extract_value(&json!("text"), "name"), None);
        assert_eq!(extract_value(&json!([1, 2]), "a.b"), None);
    }
}
