//! Export configuration validation.
//!
//! Two layers of checks guard an export:
//!
//! ## Document shape
//! A raw configuration document is checked against the JSON Schema (Draft 7)
//! embedded at compile time from `schemas/csv-export-config.json`: mapping
//! present and non-empty, single-character dialect, typed optional fields.
//!
//! ## Mapping against data
//! Every mapped column needs a name and a source path that exists among the
//! dataset's field paths. All problems are collected; any problem rejects the
//! whole configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use jsoncsv::models::FieldMapping;
//! use jsoncsv::validation::validate_configuration;
//!
//! let mapping = FieldMapping::new().with("Name", "name").with("City", "address.city");
//! let errors = validate_configuration(&mapping, &["name".to_string()]);
//! assert_eq!(
//!     errors,
//!     vec!["Source field 'address.city' for column 'City' does not exist in the JSON data"]
//! );
//! ```

pub mod suggest;

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{ValidationError, ValidationResult};
use crate::models::{CsvDialect, CsvExportConfig, FieldMapping};

pub use suggest::{suggest_column_name, suggest_field_mappings};

static CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/csv-export-config.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON Schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick check, true/false only.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Shape check of a raw configuration document.
pub fn validate_config_document(document: &Value) -> Result<(), Vec<String>> {
    validate(&CONFIG_SCHEMA, document)
}

/// Check a mapping against the field paths of a dataset.
///
/// Entries are checked in order. An entry without a column name reports
/// only that; otherwise an empty path or a path absent from
/// `available_paths` is reported. Repeated column names are reported too.
pub fn validate_configuration(mapping: &FieldMapping, available_paths: &[String]) -> Vec<String> {
    let available: HashSet<&str> = available_paths.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut errors = Vec::new();

    for entry in mapping {
        if entry.column.is_empty() {
            errors.push("CSV column name cannot be empty".to_string());
            continue;
        }
        if !seen.insert(entry.column.as_str()) {
            errors.push(format!("Duplicate CSV column '{}'", entry.column));
        }
        if entry.field.is_empty() {
            errors.push(format!(
                "Source field for column '{}' cannot be empty",
                entry.column
            ));
            continue;
        }
        if !available.contains(entry.field.as_str()) {
            errors.push(format!(
                "Source field '{}' for column '{}' does not exist in the JSON data",
                entry.field, entry.column
            ));
        }
    }

    errors
}

/// Every dialect character must be a single ASCII character.
pub fn validate_dialect(dialect: &CsvDialect) -> ValidationResult<()> {
    let checks = [
        ("delimiter", dialect.delimiter),
        ("enclosure", dialect.enclosure),
        ("escape", dialect.escape),
    ];
    for (name, c) in checks {
        if !c.is_ascii() {
            return Err(ValidationError::InvalidDialect(format!(
                "{} '{}' is not an ASCII character",
                name, c
            )));
        }
    }
    if dialect.delimiter == dialect.enclosure {
        return Err(ValidationError::InvalidDialect(
            "delimiter and enclosure must differ".to_string(),
        ));
    }
    Ok(())
}

/// Full check of a typed configuration before export.
pub fn validate_export_config(config: &CsvExportConfig, available_paths: &[String]) -> ValidationResult<()> {
    validate_dialect(&config.dialect)?;
    let errors = validate_configuration(&config.field_mappings, available_paths);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InvalidConfiguration { errors })
    }
}
