//! REST API types.

use axum::http::StatusCode;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{GenerateError, PipelineError, ServerError};
use crate::models::FieldValues;
use crate::parser::{PreviewTable, SourceFormat};
use crate::transform::RunReport;

/// Rows shown by `/api/preview` unless the request asks otherwise.
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Uploaded input rendered for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub format: SourceFormat,
    /// Template field values of the previewed rows, when the input loads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<FieldValues>>,
}

impl PreviewResponse {
    pub fn new(table: PreviewTable, records: Option<Vec<FieldValues>>) -> Self {
        Self {
            headers: table.headers,
            rows: table.rows,
            row_count: table.row_count,
            format: table.format,
            records,
        }
    }
}

/// Result of `/api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub run_id: String,
    /// "done" or "empty"
    pub status: String,
    pub run_at: NaiveDateTime,
    pub row_count: usize,
    pub files: Vec<PathBuf>,
    pub computed: Vec<String>,
}

impl From<RunReport> for GenerateResponse {
    fn from(report: RunReport) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            status: if report.files.is_empty() { "empty" } else { "done" }.to_string(),
            run_at: report.run_at,
            row_count: report.row_count,
            files: report.files,
            computed: report.computed,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "runId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "files": [],
    })
}

/// HTTP status for a failed request.
pub fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::Pipeline(PipelineError::Generate(GenerateError::Fill(_))) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ServerError::Pipeline(PipelineError::Generate(GenerateError::OutputExists(_))) => {
            StatusCode::CONFLICT
        }
        ServerError::Pipeline(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}
