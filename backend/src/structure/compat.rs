//! Structure compatibility across re-uploads.
//!
//! A new upload may add paths but never drop one the stored structure had,
//! otherwise saved CSV configurations could silently reference absent fields.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{join_path, PathCollector, StructureNode};
use crate::error::IncompatibleStructure;

/// Outcome of comparing a stored structure against a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    pub missing_paths: Vec<String>,
    pub added_paths: Vec<String>,
    pub message: String,
}

impl CompatibilityReport {
    /// `Err` when the new structure lost paths.
    pub fn into_result(self) -> Result<CompatibilityReport, IncompatibleStructure> {
        if self.compatible {
            Ok(self)
        } else {
            Err(IncompatibleStructure {
                missing_paths: self.missing_paths,
                added_paths: self.added_paths,
                message: self.message,
            })
        }
    }
}

/// Compare two structures. Compatible iff every old path exists in the new one.
pub fn are_compatible(old: &StructureNode, new: &StructureNode) -> CompatibilityReport {
    let old_paths = structure_paths(old);
    let new_paths = structure_paths(new);

    let new_set: HashSet<&str> = new_paths.iter().map(String::as_str).collect();
    let old_set: HashSet<&str> = old_paths.iter().map(String::as_str).collect();

    let missing_paths: Vec<String> = old_paths
        .iter()
        .filter(|p| !new_set.contains(p.as_str()))
        .cloned()
        .collect();
    let added_paths: Vec<String> = new_paths
        .iter()
        .filter(|p| !old_set.contains(p.as_str()))
        .cloned()
        .collect();

    let compatible = missing_paths.is_empty();
    let message = if compatible {
        "Structures are compatible".to_string()
    } else {
        format!("New structure is missing required paths: {}", missing_paths.join(", "))
    };

    CompatibilityReport {
        compatible,
        missing_paths,
        added_paths,
        message,
    }
}

/// Every dotted path described by a structure tree.
///
/// Array nodes contribute the paths of their element type without a prefix
/// segment, mirroring [`super::extract_field_paths`].
pub fn structure_paths(structure: &StructureNode) -> Vec<String> {
    let mut collector = PathCollector::default();
    collect(structure, "", &mut collector);
    collector.paths
}

fn collect(node: &StructureNode, prefix: &str, out: &mut PathCollector) {
    match node {
        StructureNode::Object { properties } => {
            for (key, child) in properties {
                let path = join_path(prefix, key);
                out.insert(path.clone());
                collect(child, &path, out);
            }
        }
        StructureNode::Array {
            element_type: Some(element),
            ..
        } => collect(element, prefix, out),
        _ => {}
    }
}
