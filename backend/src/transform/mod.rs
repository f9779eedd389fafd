//! Transformation module.
//!
//! This module turns records into CSV rows:
//! - Extract: dotted field path lookup
//! - Operations: per-column transformations
//! - Expr: sandboxed callback expression language
//! - Predicate: filter / condition operators
//! - Mapper: records → rows, filtering, column ordering
//! - Profile: column type detection

pub mod expr;
pub mod extract;
pub mod mapper;
pub mod operations;
pub mod predicate;
pub mod profile;
pub mod value;

pub use expr::{evaluate_callback, Expression};
pub use extract::extract_value;
pub use mapper::{apply_filters, passes_filters, reorder_columns, transform_data, transform_record};
pub use operations::{CaseKind, Condition, Replacement, TransformationSpec};
pub use predicate::{evaluate, Operator};
pub use profile::{analyze_columns, ColumnAnalysis, DataType};
pub use value::string_form;
