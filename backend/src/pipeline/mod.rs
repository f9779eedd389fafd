//! High-level boundaries combining ingestion, validation and export.
//!
//! These are the operations callers (CLI, HTTP API) use. Each one logs its
//! progress through [`crate::api::logs`]; the leaf modules stay silent.
//!
//! # Example
//!
//! ```rust,ignore
//! use jsoncsv::pipeline::{ingest, export_csv};
//! use jsoncsv::models::{CsvExportConfig, FieldMapping};
//!
//! let doc = ingest(br#"[{"name": "Ann"}]"#, 1024)?;
//! let config = CsvExportConfig::new(FieldMapping::new().with("Name", "name"));
//! assert_eq!(export_csv(&doc.value, &config)?, "Name\nAnn\n");
//! ```

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::error::{PipelineResult, ValidationError, ValidationResult};
use crate::export::{self, BatchExport};
use crate::models::{CsvExportConfig, FieldMapping};
use crate::parser::{ingest_bytes, Ingested};
use crate::structure::{
    analyze_structure, are_compatible, extract_field_paths, records, CompatibilityReport,
    StructureNode,
};
use crate::transform::mapper::transform_data;
use crate::transform::operations::TransformationSpec;
use crate::transform::profile::{analyze_columns, ColumnAnalysis};
use crate::validation::{suggest_field_mappings, validate_config_document, validate_export_config};

/// Preview rows returned when the caller does not ask for a number.
pub const DEFAULT_PREVIEW_LIMIT: usize = 5;

/// Largest preview a caller may request.
pub const MAX_PREVIEW_LIMIT: usize = 20;

/// Field discovery for a freshly uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub available_fields: Vec<String>,
    pub suggested_mappings: FieldMapping,
    pub structure: StructureNode,
}

/// A re-upload that kept every previously known path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reupload {
    pub ingested: Ingested,
    pub report: CompatibilityReport,
}

/// First rows of an export, without filters or column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_records: usize,
    pub preview_records: usize,
}

/// Parse and describe an upload.
pub fn ingest(bytes: &[u8], max_bytes: usize) -> PipelineResult<Ingested> {
    log_info(format!("Ingesting {} bytes", bytes.len()));
    let ingested = ingest_bytes(bytes, max_bytes)?;
    log_info_indent(format!("Encoding: {}", ingested.encoding), 1);
    log_success(format!(
        "Parsed {} record(s), {} field path(s)",
        ingested.record_count,
        ingested.field_paths.len()
    ));
    Ok(ingested)
}

/// Available fields and suggested column names for a document.
pub fn suggest(value: &Value) -> Suggestion {
    let available_fields = extract_field_paths(value);
    let suggested_mappings = suggest_field_mappings(&available_fields);
    Suggestion {
        structure: analyze_structure(value),
        available_fields,
        suggested_mappings,
    }
}

/// Ingest a replacement upload, refusing it when it lost known paths.
pub fn check_reupload(old: &StructureNode, bytes: &[u8], max_bytes: usize) -> PipelineResult<Reupload> {
    let ingested = ingest(bytes, max_bytes)?;
    let report = are_compatible(old, &ingested.structure);
    if !report.compatible {
        log_warning(report.message.clone());
    } else if !report.added_paths.is_empty() {
        log_info_indent(format!("New paths: {}", report.added_paths.join(", ")), 1);
    }
    let report = report.into_result()?;
    Ok(Reupload { ingested, report })
}

/// Resolve a requested preview size.
pub fn preview_limit(requested: Option<usize>, default: usize) -> ValidationResult<usize> {
    let limit = requested.unwrap_or(default);
    if !(1..=MAX_PREVIEW_LIMIT).contains(&limit) {
        return Err(ValidationError::InvalidPreviewLimit(limit));
    }
    Ok(limit)
}

/// Transform the first `limit` records.
///
/// Filters and column order are not applied; unknown paths yield `null`.
pub fn preview(
    value: &Value,
    mapping: &FieldMapping,
    transformations: &IndexMap<String, TransformationSpec>,
    limit: Option<usize>,
) -> PipelineResult<PreviewResult> {
    let limit = preview_limit(limit, DEFAULT_PREVIEW_LIMIT)?;
    let all = records(value);
    let rows = transform_data(all.iter().take(limit).copied(), mapping, transformations);

    let headers = rows
        .first()
        .map(|row| row.columns().map(String::from).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<Value>> = rows
        .into_iter()
        .map(|row| row.into_cells().into_iter().map(|(_, v)| v).collect())
        .collect();

    Ok(PreviewResult {
        headers,
        preview_records: rows.len(),
        total_records: all.len(),
        rows,
    })
}

/// Parse a raw configuration document after checking its shape.
pub fn load_config(document: &Value) -> PipelineResult<CsvExportConfig> {
    validate_config_document(document)
        .map_err(|errors| ValidationError::InvalidDocument { errors })?;
    Ok(CsvExportConfig::from_value(document)?)
}

/// Validate a configuration against a document.
pub fn validate_config(value: &Value, config: &CsvExportConfig) -> ValidationResult<()> {
    let paths = extract_field_paths(value);
    let result = validate_export_config(config, &paths);
    if let Err(err) = &result {
        for message in err.messages() {
            log_warning_indent(message, 1);
        }
    }
    result
}

/// Validated single export.
pub fn export_csv(value: &Value, config: &CsvExportConfig) -> PipelineResult<String> {
    log_info(format!(
        "Exporting {} column(s) from {} record(s)",
        config.field_mappings.len(),
        records(value).len()
    ));
    validate_config(value, config)?;
    let csv = export::generate_csv(value, config)?;
    log_success(format!("Generated {} bytes of CSV", csv.len()));
    Ok(csv)
}

/// Validated export of several configurations.
pub fn export_batch(
    value: &Value,
    configs: &[CsvExportConfig],
    timestamp: &NaiveDateTime,
) -> PipelineResult<BatchExport> {
    log_info(format!("Batch export of {} configuration(s)", configs.len()));
    if configs.is_empty() {
        return Err(ValidationError::InvalidConfiguration {
            errors: vec!["At least one configuration is required".to_string()],
        }
        .into());
    }
    for config in configs {
        validate_config(value, config)?;
    }
    let batch = export::export_batch(value, configs, timestamp)?;
    log_success(format!("Generated {} file(s)", batch.files().len()));
    Ok(batch)
}

/// Column types and samples for a mapping.
pub fn profile_columns(value: &Value, mapping: &FieldMapping) -> ColumnAnalysis {
    analyze_columns(&records(value), mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::FilterPredicate;
    use crate::transform::predicate::Operator;
    use serde_json::json;

    fn people() -> Value {
        json!([
            {"name": "Ann", "age": 17},
            {"name": "Bo", "age": 18},
            {"name": "Cy", "age": 19}
        ])
    }

    #[test]
    fn test_suggest() {
        let suggestion = suggest(&json!([{"user": {"first_name": "Ann"}}]));
        assert_eq!(suggestion.available_fields, vec!["user", "user.first_name"]);
        assert_eq!(suggestion.suggested_mappings.field_for("First Name"), Some("user.first_name"));
    }

    #[test]
    fn test_reupload() {
        let old = analyze_structure(&json!([{"a": 1, "b": 2}]));
        let ok = check_reupload(&old, br#"[{"a": 1, "b": 2, "c": 3}]"#, 1024).unwrap();
        assert_eq!(ok.report.added_paths, vec!["c"]);

        let err = check_reupload(&old, br#"[{"a": 1}]"#, 1024).unwrap_err();
        match err {
            PipelineError::Incompatible(e) => assert_eq!(e.missing_paths, vec!["b"]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_preview_limits() {
        let mapping = FieldMapping::new().with("Name", "name");
        let result = preview(&people(), &mapping, &IndexMap::new(), Some(2)).unwrap();
        assert_eq!(result.headers, vec!["Name"]);
        assert_eq!(result.rows, vec![vec![json!("Ann")], vec![json!("Bo")]]);
        assert_eq!(result.total_records, 3);
        assert_eq!(result.preview_records, 2);

        assert!(preview(&people(), &mapping, &IndexMap::new(), Some(0)).is_err());
        assert!(preview(&people(), &mapping, &IndexMap::new(), Some(21)).is_err());
        assert_eq!(preview_limit(None, DEFAULT_PREVIEW_LIMIT).unwrap(), 5);
    }

    #[test]
    fn test_export_validates_mapping() {
        let config = CsvExportConfig::new(FieldMapping::new().with("Ghost", "ghost"));
        let err = export_csv(&people(), &config).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_export_applies_filters() {
        let config = CsvExportConfig::new(FieldMapping::new().with("Name", "name"))
            .with_filter(FilterPredicate::new("age", Operator::Ge, json!(18)));
        assert_eq!(export_csv(&people(), &config).unwrap(), "Name\nBo\nCy\n");
    }

    #[test]
    fn test_load_config() {
        let config = load_config(&json!({"field_mappings": {"A": "a"}, "delimiter": ";"})).unwrap();
        assert_eq!(config.dialect.delimiter, ';');

        let err = load_config(&json!({"field_mappings": {}})).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(export_batch(&people(), &[], &ts).is_err());
    }
}
