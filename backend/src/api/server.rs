//! HTTP Server for the jsoncsv API.
//!
//! Stateless JSON endpoints over the pipeline boundaries. Datasets and
//! configurations are sent with each request; storing them is the caller's
//! concern.
//!
//! # API Endpoints
//!
//! | Method | Path                 | Description                              |
//! |--------|----------------------|------------------------------------------|
//! | GET    | `/health`            | Health check                             |
//! | POST   | `/api/ingest`        | Upload JSON (multipart `file` or body)   |
//! | POST   | `/api/suggest`       | Field paths and suggested mappings       |
//! | POST   | `/api/compatibility` | Check a re-upload against a structure    |
//! | POST   | `/api/preview`       | First rows, no filters or column order   |
//! | POST   | `/api/validate`      | Validate a configuration                 |
//! | POST   | `/api/columns`       | Column types and samples                 |
//! | POST   | `/api/export`        | CSV download                             |
//! | POST   | `/api/export/batch`  | CSV download or bundle of files          |
//! | GET    | `/api/logs`          | SSE stream for real-time logs            |

use axum::{
    body::to_bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use chrono::Local;
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{
    ApiResponse, BatchRequest, ColumnsRequest, CompatibilityRequest, CompatibilityResponse,
    ConfigRequest, IngestSummary, PreviewRequest, SuggestRequest, ValidationReport,
};
use crate::config::Settings;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::export::{generate_filename, BatchExport, CsvFile, DEFAULT_EXPORT_NAME};
use crate::models::CsvExportConfig;
use crate::pipeline::{self, PreviewResult, Suggestion};
use crate::transform::profile::ColumnAnalysis;

/// Shared, read-only server state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
}

/// Build the application router.
pub fn router(settings: Settings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    // JSON bodies wrap the document, leave room beyond the raw upload limit
    let body_limit = settings.max_upload_bytes.saturating_mul(2);
    let state = AppState {
        settings: Arc::new(settings),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/ingest", post(ingest_upload))
        .route("/api/suggest", post(suggest))
        .route("/api/compatibility", post(compatibility))
        .route("/api/preview", post(preview))
        .route("/api/validate", post(validate))
        .route("/api/columns", post(columns))
        .route("/api/export", post(export))
        .route("/api/export/batch", post(export_batch))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.port;
    let app = router(settings);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("🚀 jsoncsv server running on http://localhost:{}", port);
    eprintln!("   POST /api/ingest        - Upload JSON document");
    eprintln!("   POST /api/preview       - Preview CSV rows");
    eprintln!("   POST /api/export        - Download CSV");
    eprintln!("   GET  /api/logs          - SSE log stream");
    eprintln!("   GET  /health            - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "jsoncsv",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "ingest": "POST /api/ingest",
            "suggest": "POST /api/suggest",
            "compatibility": "POST /api/compatibility",
            "preview": "POST /api/preview",
            "validate": "POST /api/validate",
            "columns": "POST /api/columns",
            "export": "POST /api/export",
            "batch": "POST /api/export/batch",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

async fn read_file_field(mut multipart: Multipart) -> ServerResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ServerError::BadRequest("No file provided".to_string()))
}

/// Upload endpoint: multipart `file` field or the raw request body.
async fn ingest_upload(
    State(state): State<AppState>,
    request: Request,
) -> ServerResult<Json<ApiResponse<IngestSummary>>> {
    let limit = state.settings.max_upload_bytes;
    let bytes = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        read_file_field(multipart).await?
    } else {
        to_bytes(request.into_body(), limit.saturating_add(1))
            .await
            .map_err(|_| ServerError::PayloadTooLarge(limit))?
            .to_vec()
    };

    let ingested = pipeline::ingest(&bytes, limit).map_err(log_failure)?;
    Ok(Json(ApiResponse::ok(IngestSummary::from(ingested))))
}

async fn suggest(Json(req): Json<SuggestRequest>) -> Json<ApiResponse<Suggestion>> {
    Json(ApiResponse::ok(pipeline::suggest(&req.data)))
}

async fn compatibility(
    State(state): State<AppState>,
    Json(req): Json<CompatibilityRequest>,
) -> ServerResult<Json<ApiResponse<CompatibilityResponse>>> {
    let bytes = serde_json::to_vec(&req.data).map_err(PipelineError::from)?;
    let reupload = pipeline::check_reupload(&req.structure, &bytes, state.settings.max_upload_bytes)
        .map_err(log_failure)?;
    Ok(Json(ApiResponse::ok(CompatibilityResponse {
        report: reupload.report,
        document: IngestSummary::from(reupload.ingested),
    })))
}

async fn preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> ServerResult<Json<ApiResponse<PreviewResult>>> {
    let limit = req.limit.unwrap_or(state.settings.preview_default);
    let result = pipeline::preview(&req.data, &req.field_mappings, &req.transformations, Some(limit))?;
    Ok(Json(ApiResponse::ok(result)))
}

async fn validate(Json(req): Json<ConfigRequest>) -> Json<ApiResponse<ValidationReport>> {
    let errors = match pipeline::load_config(&req.config) {
        Ok(config) => match pipeline::validate_config(&req.data, &config) {
            Ok(()) => Vec::new(),
            Err(err) => err.messages(),
        },
        Err(PipelineError::Validation(err)) => err.messages(),
        Err(other) => vec![other.to_string()],
    };
    Json(ApiResponse::ok(ValidationReport::from_errors(errors)))
}

async fn columns(Json(req): Json<ColumnsRequest>) -> Json<ApiResponse<ColumnAnalysis>> {
    Json(ApiResponse::ok(pipeline::profile_columns(&req.data, &req.field_mappings)))
}

fn csv_attachment(filename: &str, content: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        content,
    )
        .into_response()
}

async fn export(Json(req): Json<ConfigRequest>) -> ServerResult<Response> {
    let config = pipeline::load_config(&req.config)?;
    let csv = pipeline::export_csv(&req.data, &config).map_err(log_failure)?;
    let name = config.name.as_deref().unwrap_or(DEFAULT_EXPORT_NAME);
    let filename = generate_filename(name, &Local::now().naive_local());
    Ok(csv_attachment(&filename, csv))
}

async fn export_batch(Json(req): Json<BatchRequest>) -> ServerResult<Response> {
    let configs = req
        .configs
        .iter()
        .map(pipeline::load_config)
        .collect::<Result<Vec<CsvExportConfig>, PipelineError>>()?;

    let batch = pipeline::export_batch(&req.data, &configs, &Local::now().naive_local())
        .map_err(log_failure)?;
    Ok(match batch {
        BatchExport::Single(CsvFile { filename, content, .. }) => csv_attachment(&filename, content),
        bundle @ BatchExport::Bundle { .. } => Json(ApiResponse::ok(bundle)).into_response(),
    })
}

fn log_failure(err: PipelineError) -> ServerError {
    log_error(err.to_string());
    ServerError::Pipeline(err)
}
