//! HTTP server for the EFS writer.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/health`         | Health check                             |
//! | POST   | `/api/preview`    | Upload an input file, get a preview      |
//! | POST   | `/api/generate`   | Run a generation from a JSON `RunConfig` |
//! | GET    | `/api/logs`       | SSE stream for real-time logs            |
//!
//! The server listens on loopback unless told otherwise. Cross-origin
//! requests are refused unless their origin is listed in the options or in
//! `EFS_ALLOWED_ORIGINS`. Generation requests that leave `overwrite` out get
//! `keep`, so a remote caller never replaces files by omission.

use axum::{
    extract::Multipart,
    http::{header, HeaderValue, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, status_for, GenerateResponse, PreviewResponse, DEFAULT_PREVIEW_ROWS};
use crate::config::{OverwritePolicy, RunConfig};
use crate::error::ServerError;
use crate::parser::read_source_bytes;
use crate::pdf::AcroFormFiller;
use crate::transform::mapping::FieldMapping;
use crate::transform::{run, transform_table};

type ApiError = (StatusCode, Json<Value>);

/// Routes of the API, without CORS.
pub fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/preview", post(preview))
        .route("/api/generate", post(generate))
        .route("/api/logs", get(sse_logs))
}

/// Comma-separated origins allowed to call the API from a browser.
pub const ALLOWED_ORIGINS_ENV: &str = "EFS_ALLOWED_ORIGINS";

/// Where the server listens and who may call it cross-origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub host: IpAddr,
    pub port: u16,
    /// Exact origins, e.g. `http://localhost:5173`. Empty means same-origin only.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerOptions {
    /// Fall back to `EFS_ALLOWED_ORIGINS` when no origin was given.
    pub fn with_env_origins(mut self) -> Self {
        if self.allowed_origins.is_empty() {
            if let Ok(value) = std::env::var(ALLOWED_ORIGINS_ENV) {
                self.allowed_origins = split_origins(&value);
            }
        }
        self
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// CORS layer admitting only the listed origins.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o.trim_end_matches('/'))
                .map_err(|_| ServerError::BadRequest(format!("Invalid origin '{}'", o)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]))
}

/// Start the HTTP server
pub async fn start_server(options: ServerOptions) -> Result<(), Box<dyn std::error::Error>> {
    let app = router().layer(cors_layer(&options.allowed_origins)?);

    let addr = options.addr();
    eprintln!("🚀 EFS writer running on http://{}", addr);
    if options.allowed_origins.is_empty() {
        eprintln!("   CORS: same-origin only");
    } else {
        eprintln!("   CORS: {}", options.allowed_origins.join(", "));
    }
    eprintln!("   POST /api/preview  - Upload input file for preview");
    eprintln!("   POST /api/generate - Generate documents");
    eprintln!("   GET  /api/logs     - SSE log stream");
    eprintln!("   GET  /health       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "efs-writer",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "preview": "POST /api/preview",
            "generate": "POST /api/generate",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Multipart `file` (required) and `rows` (optional row limit).
async fn preview(mut multipart: Multipart) -> Result<Json<PreviewResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut limit = DEFAULT_PREVIEW_ROWS;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                file_data = Some(bytes.to_vec());
            }
            "rows" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                limit = text
                    .trim()
                    .parse()
                    .map_err(|_| reject(ServerError::BadRequest(format!("Invalid row limit '{}'", text))))?;
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| reject(ServerError::BadRequest("No file provided".into())))?;
    log_info(format!(
        "📄 Preview: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let extension = upload_extension(file_name.as_deref());
    let table = read_source_bytes(&bytes, &extension)
        .map_err(|e| reject(ServerError::BadRequest(e.to_string())))?;

    // the raw table is still worth showing when rows fail to load
    let records = match transform_table(&table) {
        Ok(records) => {
            let mapping = FieldMapping::efs();
            Some(records.iter().take(limit).map(|r| r.to_fields(&mapping)).collect())
        }
        Err(e) => {
            log_error(format!("{}", e));
            None
        }
    };

    Ok(Json(PreviewResponse::new(table.preview(limit), records)))
}

async fn generate(Json(body): Json<Value>) -> Result<Json<GenerateResponse>, ApiError> {
    let config = api_run_config(body)
        .map_err(|e| reject(ServerError::BadRequest(format!("Invalid run config: {}", e))))?;
    log_info(format!("📄 Generate: {}", config.input.display()));

    let report = tokio::task::spawn_blocking(move || run(&config, &AcroFormFiller))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(|e| reject(ServerError::from(e)))?;

    Ok(Json(GenerateResponse::from(report)))
}

/// A `RunConfig` from a request body; `overwrite` defaults to `keep`.
fn api_run_config(mut body: Value) -> Result<RunConfig, serde_json::Error> {
    if let Value::Object(map) = &mut body {
        if !map.contains_key("overwrite") {
            map.insert("overwrite".into(), serde_json::to_value(OverwritePolicy::Keep)?);
        }
    }
    serde_json::from_value(body)
}

fn reject(err: ServerError) -> ApiError {
    log_error(err.to_string());
    (status_for(&err), Json(error_response(&err.to_string())))
}

/// Lowercase extension of an uploaded file name, empty when unknown.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}
