//! Domain models for the JSON to CSV export pipeline.
//!
//! - [`FieldMapping`] - Ordered CSV column → field path pairs
//! - [`FilterPredicate`] - One `field operator value` filter clause
//! - [`CsvDialect`] - Delimiter / enclosure / escape triple
//! - [`CsvExportConfig`] - Everything needed to turn a dataset into CSV
//! - [`Row`] - One transformed output row

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::transform::operations::TransformationSpec;
use crate::transform::predicate::Operator;

// =============================================================================
// Field Mapping
// =============================================================================

/// One CSV column and the field path it reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    /// Missing or `null` reads as an empty path, which validation reports
    #[serde(default, alias = "source", alias = "path", deserialize_with = "null_as_default")]
    pub field: String,
}

impl ColumnMapping {
    pub fn new(column: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            field: field.into(),
        }
    }
}

/// Ordered mapping from CSV column name to source field path.
///
/// Column order in the output follows declaration order. Deserializes from a
/// JSON object (`{"Name": "user.name"}`, key order kept) or from a list of
/// `{"column": .., "field": ..}` pairs. Serializes as an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<ColumnMapping>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Builder style.
    pub fn with(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.push(column, field);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, field: impl Into<String>) {
        self.entries.push(ColumnMapping::new(column, field));
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// CSV column names in declaration order.
    pub fn columns(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.column.as_str()).collect()
    }

    /// Source path for a column, if mapped.
    pub fn field_for(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.column == column)
            .map(|e| e.field.as_str())
    }

    /// Insert or overwrite a column, keeping its first position.
    pub fn upsert(&mut self, column: impl Into<String>, field: impl Into<String>) {
        let column = column.into();
        let field = field.into();
        match self.entries.iter_mut().find(|e| e.column == column) {
            Some(existing) => existing.field = field,
            None => self.entries.push(ColumnMapping { column, field }),
        }
    }
}

impl FromIterator<(String, String)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(column, field)| ColumnMapping { column, field })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FieldMapping {
    type Item = &'a ColumnMapping;
    type IntoIter = std::slice::Iter<'a, ColumnMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.column, &entry.field)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = FieldMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of column → field path, or a list of {column, field} pairs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMapping, A::Error> {
                let mut mapping = FieldMapping::new();
                // null sources are kept as empty paths so validation reports them
                while let Some((column, field)) = access.next_entry::<String, Option<String>>()? {
                    mapping.push(column, field.unwrap_or_default());
                }
                Ok(mapping)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<FieldMapping, A::Error> {
                let mut mapping = FieldMapping::new();
                while let Some(entry) = access.next_element::<ColumnMapping>()? {
                    mapping.entries.push(entry);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_any(MappingVisitor)
    }
}

// =============================================================================
// Filters
// =============================================================================

/// A single filter clause. A record passes a filter list iff every clause holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

// =============================================================================
// CSV Dialect
// =============================================================================

/// Delimiter / enclosure / escape characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvDialect {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_enclosure")]
    pub enclosure: char,
    #[serde(default = "default_escape")]
    pub escape: char,
}

fn default_delimiter() -> char {
    ','
}

fn default_enclosure() -> char {
    '"'
}

fn default_escape() -> char {
    '\\'
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            enclosure: default_enclosure(),
            escape: default_escape(),
        }
    }
}

// =============================================================================
// Export Configuration
// =============================================================================

/// Complete description of one CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvExportConfig {
    /// Human-readable name, used for export file names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub field_mappings: FieldMapping,

    /// Columns to move to the front, in this order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_order: Option<Vec<String>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Vec<FilterPredicate>,

    /// CSV column → transformation applied to that column's value
    #[serde(default, deserialize_with = "null_as_default")]
    pub transformations: IndexMap<String, TransformationSpec>,

    #[serde(default = "default_true")]
    pub include_headers: bool,

    #[serde(flatten)]
    pub dialect: CsvDialect,
}

fn default_true() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl CsvExportConfig {
    /// A config with only a field mapping and all defaults.
    pub fn new(field_mappings: FieldMapping) -> Self {
        Self {
            name: None,
            description: None,
            field_mappings,
            column_order: None,
            filters: Vec::new(),
            transformations: IndexMap::new(),
            include_headers: true,
            dialect: CsvDialect::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_filter(mut self, filter: FilterPredicate) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_transformation(mut self, column: impl Into<String>, spec: TransformationSpec) -> Self {
        self.transformations.insert(column.into(), spec);
        self
    }

    pub fn with_column_order(mut self, order: Vec<String>) -> Self {
        self.column_order = Some(order);
        self
    }

    pub fn with_dialect(mut self, dialect: CsvDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn without_headers(mut self) -> Self {
        self.include_headers = false;
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn has_transformations(&self) -> bool {
        !self.transformations.is_empty()
    }
}

// =============================================================================
// Output Row
// =============================================================================

/// One output row: ordered (column, value) cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.cells.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.iter().any(|(c, _)| c == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cells.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn into_cells(self) -> Vec<(String, Value)> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
