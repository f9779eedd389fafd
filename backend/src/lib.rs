//! # jsoncsv - JSON to CSV transformation engine
//!
//! jsoncsv takes arbitrary JSON documents, infers their structure and turns
//! their records into CSV through explicit, reusable export configurations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ JSON upload │────▶│   Ingest    │────▶│  Transform  │────▶│  CSV text   │
//! │ (any enc.)  │     │ (structure) │     │ (map/filter)│     │  (dialect)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jsoncsv::{export_csv, ingest_str, CsvExportConfig, FieldMapping};
//!
//! let doc = ingest_str(r#"[{"name": "Ann", "age": 30}]"#, 1 << 20)?;
//! let config = CsvExportConfig::new(FieldMapping::new().with("Name", "name").with("Age", "age"));
//! println!("{}", export_csv(&doc.value, &config)?);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Field mappings, filters, dialect, export configuration, rows
//! - [`structure`] - Structure inference, field paths, compatibility
//! - [`parser`] - JSON ingestion with encoding detection
//! - [`transform`] - Extraction, transformations, expressions, filters, profiling
//! - [`export`] - CSV emission and batch export
//! - [`validation`] - Configuration validation and mapping suggestions
//! - [`pipeline`] - High-level boundaries (ingest, preview, export)
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Structure and ingestion
pub mod parser;
pub mod structure;

// Transformation
pub mod transform;

// Output
pub mod export;

// Validation
pub mod validation;

// Orchestration
pub mod config;
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError, ExpressionError, IncompatibleStructure, IngestError, PipelineError, ServerError,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{ColumnMapping, CsvDialect, CsvExportConfig, FieldMapping, FilterPredicate, Row};

// =============================================================================
// Re-exports - Structure
// =============================================================================

pub use structure::{
    analyze_structure,
    analyze_structure_with_depth,
    are_compatible,
    count_records,
    extract_field_paths,
    records,
    CompatibilityReport,
    StructureNode,
};

// =============================================================================
// Re-exports - Ingestion
// =============================================================================

pub use parser::{decode_content, detect_encoding, ingest_bytes, ingest_file, ingest_str, Ingested};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    analyze_columns,
    apply_filters,
    evaluate,
    extract_value,
    reorder_columns,
    transform_data,
    ColumnAnalysis,
    Operator,
    TransformationSpec,
};
pub use transform::operations::operations_description;

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{generate, generate_csv, generate_filename, generate_multiple, BatchExport, CsvFile};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    suggest_column_name,
    suggest_field_mappings,
    validate_config_document,
    validate_configuration,
    validate_dialect,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    check_reupload,
    export_batch,
    export_csv,
    ingest,
    preview,
    suggest,
    PreviewResult,
    Suggestion,
};

pub use config::Settings;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
