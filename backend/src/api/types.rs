//! REST API request and response types.
//!
//! Every JSON response carries a `requestId` and a `status`. Errors use the
//! same envelope with `error` and `details`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ExportError, IngestError, PipelineError, ServerError};
use crate::models::FieldMapping;
use crate::parser::Ingested;
use crate::structure::{CompatibilityReport, StructureNode};
use crate::transform::operations::TransformationSpec;

/// Successful response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub request_id: String,
    /// Always "ok"
    pub status: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            status: "ok".to_string(),
            data,
        }
    }
}

/// Description of an uploaded document, without the document itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub encoding: String,
    pub record_count: usize,
    pub field_paths: Vec<String>,
    pub structure: StructureNode,
}

impl From<Ingested> for IngestSummary {
    fn from(ingested: Ingested) -> Self {
        Self {
            encoding: ingested.encoding,
            record_count: ingested.record_count,
            field_paths: ingested.field_paths,
            structure: ingested.structure,
        }
    }
}

/// Body of `/api/suggest`.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRequest {
    pub data: Value,
}

/// Body of `/api/compatibility`: the stored structure and the new document.
#[derive(Debug, Clone, Deserialize)]
pub struct CompatibilityRequest {
    pub structure: StructureNode,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResponse {
    pub report: CompatibilityReport,
    pub document: IngestSummary,
}

/// Body of `/api/preview`.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    pub data: Value,
    pub field_mappings: FieldMapping,
    #[serde(default)]
    pub transformations: IndexMap<String, TransformationSpec>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Body of `/api/validate` and `/api/export`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigRequest {
    pub data: Value,
    /// Raw configuration document, shape-checked before use
    pub config: Value,
}

/// Body of `/api/export/batch`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub data: Value,
    pub configs: Vec<Value>,
}

/// Body of `/api/columns`.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsRequest {
    pub data: Value,
    pub field_mappings: FieldMapping,
}

/// Outcome of `/api/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Create an error response body
pub fn error_response(error: &str, details: &[String]) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "details": details,
    })
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Pipeline(err) => match err {
                PipelineError::Ingest(IngestError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
                PipelineError::Ingest(IngestError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
                PipelineError::Ingest(_) | PipelineError::Json(_) => StatusCode::BAD_REQUEST,
                PipelineError::Validation(_) | PipelineError::Incompatible(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::Export(ExportError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Individual messages behind this error.
    pub fn details(&self) -> Vec<String> {
        match self {
            ServerError::Pipeline(PipelineError::Validation(err)) => err.messages(),
            ServerError::Pipeline(PipelineError::Incompatible(err)) => err.missing_paths.clone(),
            ServerError::Pipeline(PipelineError::Export(ExportError::Validation(err))) => {
                err.messages()
            }
            _ => Vec::new(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = error_response(&self.to_string(), &self.details());
        (self.status_code(), Json(body)).into_response()
    }
}
