//! Structure inference over arbitrary JSON documents.
//!
//! - [`analyze_structure`] - Depth-bounded shape description ([`StructureNode`])
//! - [`extract_field_paths`] - Dotted paths reachable within one record
//! - [`count_records`] / [`records`] - The record view of a document
//!
//! # Records and paths
//!
//! A record is either the whole document (single object) or one element of a
//! top-level array. Field paths are relative to a record and never contain
//! array indices:
//!
//! ```text
//! [{"user": {"name": "Ann"}, "tags": [{"id": 1}]}]
//!   → user, user.name, tags, tags.id
//! ```
//!
//! Structure inference only inspects the first element of an array, while
//! path extraction visits every element. On heterogeneous arrays the two can
//! disagree.

pub mod compat;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

pub use compat::{are_compatible, structure_paths, CompatibilityReport};

/// Nodes deeper than this are collapsed to [`StructureNode::MaxDepthExceeded`].
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Inferred shape of a JSON value.
///
/// Serialized as `{"type": "object", "properties": {...}}`,
/// `{"type": "array", "length": 3, "element_type": {...}}`, `{"type": "string"}`...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructureNode {
    Object {
        #[serde(default)]
        properties: IndexMap<String, StructureNode>,
    },
    Array {
        length: usize,
        #[serde(default)]
        element_type: Option<Box<StructureNode>>,
    },
    EmptyArray,
    MaxDepthExceeded,
    String,
    Integer,
    Double,
    Boolean,
    #[serde(rename = "NULL")]
    Null,
}

impl StructureNode {
    /// The `type` tag of this node.
    pub fn kind(&self) -> &'static str {
        match self {
            StructureNode::Object { .. } => "object",
            StructureNode::Array { .. } => "array",
            StructureNode::EmptyArray => "empty_array",
            StructureNode::MaxDepthExceeded => "max_depth_exceeded",
            StructureNode::String => "string",
            StructureNode::Integer => "integer",
            StructureNode::Double => "double",
            StructureNode::Boolean => "boolean",
            StructureNode::Null => "NULL",
        }
    }

    /// Child node for an object key.
    pub fn property(&self, key: &str) -> Option<&StructureNode> {
        match self {
            StructureNode::Object { properties } => properties.get(key),
            _ => None,
        }
    }

    /// Element node of an array.
    pub fn element(&self) -> Option<&StructureNode> {
        match self {
            StructureNode::Array { element_type, .. } => element_type.as_deref(),
            _ => None,
        }
    }
}

/// Infer the structure of a value with the default depth bound.
pub fn analyze_structure(value: &Value) -> StructureNode {
    analyze_structure_with_depth(value, 0, DEFAULT_MAX_DEPTH)
}

/// Infer the structure of a value that sits at `depth`.
pub fn analyze_structure_with_depth(value: &Value, depth: usize, max_depth: usize) -> StructureNode {
    if depth > max_depth {
        return StructureNode::MaxDepthExceeded;
    }

    match value {
        Value::Array(items) if items.is_empty() => StructureNode::EmptyArray,
        Value::Array(items) => StructureNode::Array {
            length: items.len(),
            element_type: items
                .first()
                .map(|first| Box::new(analyze_structure_with_depth(first, depth + 1, max_depth))),
        },
        Value::Object(map) => StructureNode::Object {
            properties: map
                .iter()
                .map(|(key, child)| {
                    (key.clone(), analyze_structure_with_depth(child, depth + 1, max_depth))
                })
                .collect(),
        },
        Value::String(_) => StructureNode::String,
        Value::Number(n) if n.is_i64() || n.is_u64() => StructureNode::Integer,
        Value::Number(_) => StructureNode::Double,
        Value::Bool(_) => StructureNode::Boolean,
        Value::Null => StructureNode::Null,
    }
}

/// Collect every dotted field path reachable within the value.
///
/// Deduplicated, in first-seen order.
pub fn extract_field_paths(value: &Value) -> Vec<String> {
    let mut collector = PathCollector::default();
    collect_paths(value, "", &mut collector);
    collector.paths
}

/// Order-preserving set of paths.
#[derive(Default)]
pub(crate) struct PathCollector {
    pub(crate) paths: Vec<String>,
    seen: HashSet<String>,
}

impl PathCollector {
    pub(crate) fn insert(&mut self, path: String) {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
        }
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn collect_paths(value: &Value, prefix: &str, out: &mut PathCollector) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = join_path(prefix, key);
                out.insert(path.clone());
                if is_container(child) {
                    collect_paths(child, &path, out);
                }
            }
        }
        Value::Array(items) => {
            // elements share the prefix: paths carry no indices
            for item in items.iter().filter(|item| is_container(item)) {
                collect_paths(item, prefix, out);
            }
        }
        _ => {}
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Number of records in a document.
pub fn count_records(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        _ => 1,
    }
}

/// The records of a document: array elements, or the document itself.
pub fn records(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(levels: usize) -> Value {
        let mut value = json!("leaf");
        for _ in 0..levels {
            value = json!({ "child": value });
        }
        value
    }

    #[test]
    fn test_uniform_flat_array() {
        let data = json!([
            {"name": "Ann", "age": 30},
            {"name": "Bo", "age": 25},
            {"name": "Cy", "age": 41}
        ]);
        assert_eq!(count_records(&data), 3);
        assert_eq!(extract_field_paths(&data), vec!["name", "age"]);
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(analyze_structure(&json!("x")), StructureNode::String);
        assert_eq!(analyze_structure(&json!(3)), StructureNode::Integer);
        assert_eq!(analyze_structure(&json!(3.5)), StructureNode::Double);
        assert_eq!(analyze_structure(&json!(true)), StructureNode::Boolean);
        assert_eq!(analyze_structure(&Value::Null), StructureNode::Null);
        assert_eq!(analyze_structure(&json!([])), StructureNode::EmptyArray);
    }

    #[test]
    fn test_array_uses_first_element() {
        let structure = analyze_structure(&json!([{"a": 1}, {"b": "x"}]));
        match &structure {
            StructureNode::Array { length, element_type } => {
                assert_eq!(*length, 2);
                let element = element_type.as_deref().unwrap();
                assert!(element.property("a").is_some());
                assert!(element.property("b").is_none());
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_bound() {
        // root at depth 0, the seventh object sits at depth 6
        let structure = analyze_structure(&nested(7));
        let mut node = &structure;
        for _ in 0..6 {
            node = node.property("child").unwrap();
        }
        assert_eq!(*node, StructureNode::MaxDepthExceeded);

        let structure = analyze_structure(&nested(5));
        let mut node = &structure;
        for _ in 0..5 {
            node = node.property("child").unwrap();
        }
        assert_eq!(*node, StructureNode::String);
    }

    #[test]
    fn test_paths_visit_every_element() {
        let data = json!([
            {"id": 1, "meta": {"a": 1}},
            {"id": 2, "meta": {"b": 2}, "extra": [{"deep": true}]}
        ]);
        assert_eq!(
            extract_field_paths(&data),
            vec!["id", "meta", "meta.a", "meta.b", "extra", "extra.deep"]
        );
    }

    #[test]
    fn test_paths_skip_scalar_arrays() {
        let data = json!({"tags": ["a", "b"], "owner": {"name": "x"}});
        assert_eq!(extract_field_paths(&data), vec!["tags", "owner", "owner.name"]);
    }

    #[test]
    fn test_single_object_is_one_record() {
        let data = json!({"a": 1});
        assert_eq!(count_records(&data), 1);
        assert_eq!(records(&data).len(), 1);
        assert_eq!(count_records(&json!("scalar")), 1);
        assert_eq!(count_records(&json!([])), 0);
    }

    #[test]
    fn test_serialized_shape() {
        let structure = analyze_structure(&json!([{"n": null, "x": 1.5}]));
        let value = serde_json::to_value(&structure).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "array",
                "length": 1,
                "element_type": {
                    "type": "object",
                    "properties": {
                        "n": {"type": "NULL"},
                        "x": {"type": "double"}
                    }
                }
            })
        );
        let back: StructureNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, structure);
    }
}
