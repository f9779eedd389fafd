//! Error types for the jsoncsv transformation engine.
//!
//! - [`IngestError`] - JSON upload parsing errors
//! - [`ValidationError`] - Configuration validation errors
//! - [`IncompatibleStructure`] - Re-upload missing previously present paths
//! - [`ExpressionError`] - Callback expression errors (absorbed per cell)
//! - [`ExportError`] - CSV serialization errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while turning an uploaded document into a JSON value.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed JSON. The message is surfaced verbatim.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Bytes could not be decoded to text.
    #[error("Failed to decode upload: {0}")]
    Encoding(String),

    /// Payload larger than the configured limit.
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors that reject a whole configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Field mapping references unknown or empty paths.
    #[error("Invalid configuration: {}", .errors.join("; "))]
    InvalidConfiguration { errors: Vec<String> },

    /// Configuration document fails the shape checks.
    #[error("Invalid configuration document: {}", .errors.join("; "))]
    InvalidDocument { errors: Vec<String> },

    /// Preview row limit outside 1..=20.
    #[error("Preview limit must be between 1 and 20, got {0}")]
    InvalidPreviewLimit(usize),

    /// Delimiter, enclosure or escape is not a single ASCII character.
    #[error("Invalid CSV dialect: {0}")]
    InvalidDialect(String),
}

impl ValidationError {
    /// All individual messages carried by this error.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ValidationError::InvalidConfiguration { errors }
            | ValidationError::InvalidDocument { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

// =============================================================================
// Compatibility Errors
// =============================================================================

/// A re-uploaded document lacks field paths the stored structure had.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct IncompatibleStructure {
    pub missing_paths: Vec<String>,
    pub added_paths: Vec<String>,
    pub message: String,
}

// =============================================================================
// Expression Errors
// =============================================================================

/// Errors of the sandboxed callback expression language.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// Source could not be parsed.
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    /// Call to a function the language does not provide.
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Function called with the wrong number of arguments.
    #[error("Function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    /// Operand types do not support the operation.
    #[error("Type error: {0}")]
    Type(String),

    #[error("Division by zero")]
    DivisionByZero,

    /// Source or nesting exceeds the evaluator limits.
    #[error("Expression too complex: {0}")]
    TooComplex(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing rows to CSV.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Returned by the boundary functions in [`crate::pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Incompatible structure: {0}")]
    Incompatible(#[from] IncompatibleStructure),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body over the upload limit.
    #[error("Request body exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for expression evaluation.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Result type for CSV export.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let ingest = IngestError::InvalidJson("expected value at line 1 column 1".into());
        let pipeline: PipelineError = ingest.into();
        assert!(pipeline.to_string().contains("Invalid JSON"));

        let validation = ValidationError::InvalidPreviewLimit(40);
        let pipeline: PipelineError = validation.into();
        assert!(pipeline.to_string().contains("40"));
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::InvalidConfiguration {
            errors: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.messages(), vec!["first", "second"]);
        assert_eq!(err.to_string(), "Invalid configuration: first; second");
    }

    #[test]
    fn test_incompatible_structure_message() {
        let err = IncompatibleStructure {
            missing_paths: vec!["c".into()],
            added_paths: vec![],
            message: "New structure is missing required paths: c".into(),
        };
        let pipeline: PipelineError = err.into();
        assert!(pipeline.to_string().ends_with("missing required paths: c"));
    }
}
