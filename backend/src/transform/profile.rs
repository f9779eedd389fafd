//! Column profiling over the mapped, untransformed rows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::mapper::transform_data;
use super::operations::parse_datetime;
use super::value::{numeric_value, string_form};
use crate::models::{FieldMapping, Row};

/// Values inspected per column when detecting its type.
const TYPE_SAMPLE_SIZE: usize = 10;

/// Distinct sample values reported per column.
const SAMPLE_VALUES: usize = 3;

/// Detected column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Empty,
    Integer,
    Decimal,
    Boolean,
    Date,
    String,
}

/// Column overview for a mapping applied to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnAnalysis {
    pub total_records: usize,
    pub columns: Vec<String>,
    pub data_types: IndexMap<String, DataType>,
    pub sample_values: IndexMap<String, Vec<Value>>,
}

/// Profile every mapped column. Transformations are not applied.
pub fn analyze_columns(records: &[&Value], mapping: &FieldMapping) -> ColumnAnalysis {
    let mut analysis = ColumnAnalysis {
        total_records: records.len(),
        columns: Vec::new(),
        data_types: IndexMap::new(),
        sample_values: IndexMap::new(),
    };
    if records.is_empty() {
        return analysis;
    }

    let rows = transform_data(records.iter().copied(), mapping, &IndexMap::new());
    for column in mapping.columns() {
        analysis.columns.push(column.to_string());
        analysis
            .data_types
            .insert(column.to_string(), detect_data_type(&rows, column));
        analysis
            .sample_values
            .insert(column.to_string(), sample_values(&rows, column, SAMPLE_VALUES));
    }
    analysis
}

fn column_values<'a>(rows: &'a [Row], column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    rows.iter()
        .map(move |row| row.get(column).unwrap_or(&Value::Null))
}

fn detect_data_type(rows: &[Row], column: &str) -> DataType {
    let sample: Vec<&Value> = column_values(rows, column)
        .filter(|v| !matches!(v, Value::Null) && v.as_str() != Some(""))
        .take(TYPE_SAMPLE_SIZE)
        .collect();

    if sample.is_empty() {
        return DataType::Empty;
    }

    if sample.iter().all(|v| numeric_value(v).is_some()) {
        let has_decimals = sample.iter().any(|v| match v {
            Value::Number(n) => n.is_f64(),
            other => string_form(other).contains('.'),
        });
        return if has_decimals {
            DataType::Decimal
        } else {
            DataType::Integer
        };
    }

    if sample.iter().all(|v| v.is_boolean()) {
        return DataType::Boolean;
    }

    let is_date = sample
        .iter()
        .all(|v| v.as_str().is_some_and(|s| parse_datetime(s).is_some()));
    if is_date {
        return DataType::Date;
    }

    DataType::String
}

fn sample_values(rows: &[Row], column: &str, limit: usize) -> Vec<Value> {
    let mut samples: Vec<Value> = Vec::new();
    for value in column_values(rows, column) {
        if samples.len() == limit {
            break;
        }
        if !samples.contains(value) {
            samples.push(value.clone());
        }
    }
    samples
}
