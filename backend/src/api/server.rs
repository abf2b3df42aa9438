//! HTTP server for the layoffs cleaner.
//!
//! # API Endpoints
//!
//! | Method | Path          | Description                                  |
//! |--------|---------------|----------------------------------------------|
//! | GET    | `/health`     | Health check                                 |
//! | POST   | `/api/clean`  | Upload a CSV (multipart field `file`)        |
//! | GET    | `/api/rules`  | Active cleaning rules                        |
//! | GET    | `/api/logs`   | SSE stream for real-time logs                |
//!
//! `POST /api/clean` accepts `?skipBadDates=true` and `?snapshots=true`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, CleanResponse};
use crate::config::{Settings, MAX_UPLOAD_BYTES};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::pipeline::{clean_bytes, CleanOptions};
use crate::transform::rules::DatePolicy;

type ApiError = (StatusCode, Json<Value>);

/// Query flags for `POST /api/clean`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanQuery {
    #[serde(default)]
    pub skip_bad_dates: bool,
    #[serde(default)]
    pub snapshots: bool,
}

impl CleanQuery {
    fn options(&self, settings: &Settings) -> CleanOptions {
        CleanOptions {
            rules_path: settings.rules_path.clone(),
            date_policy: self.skip_bad_dates.then_some(DatePolicy::Skip),
            snapshot_dir: self.snapshots.then(|| settings.snapshot_dir.clone()),
            ..CleanOptions::default()
        }
    }
}

/// Build the router
pub fn router(settings: Settings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/clean", post(clean_upload))
        .route("/api/rules", get(active_rules))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(Arc::new(settings))
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.port;
    let app = router(settings);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("🚀 Layoffs cleaner running on http://localhost:{}", port);
    eprintln!("   POST /api/clean  - Upload CSV file");
    eprintln!("   GET  /api/rules  - Active cleaning rules");
    eprintln!("   GET  /api/logs   - SSE log stream");
    eprintln!("   GET  /health     - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "layoffs",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "clean": "POST /api/clean",
            "rules": "GET /api/rules",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// Rules the server cleans uploads with
async fn active_rules(State(settings): State<Arc<Settings>>) -> Result<Json<Value>, ApiError> {
    let options = CleanOptions {
        rules_path: settings.rules_path.clone(),
        ..CleanOptions::default()
    };
    let rules = options
        .load_rules()
        .map_err(|e| reject(ServerError::Pipeline(e.into())))?;
    let value = serde_json::to_value(&rules)
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?;
    Ok(Json(value))
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

/// Upload and clean a CSV
async fn clean_upload(
    State(settings): State<Arc<Settings>>,
    Query(query): Query<CleanQuery>,
    mut multipart: Multipart,
) -> Result<Json<CleanResponse>, ApiError> {
    let (file_name, bytes) = read_upload(&mut multipart).await.map_err(reject)?;

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let options = query.options(&settings);
    let run = tokio::task::spawn_blocking(move || clean_bytes(&bytes, &options))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(|e| {
            log_error(format!("Cleaning failed: {}", e));
            reject(ServerError::Pipeline(e))
        })?;

    Ok(Json(CleanResponse::from(run)))
}

/// Pull the `file` field out of a multipart upload.
async fn read_upload(multipart: &mut Multipart) -> ServerResult<(Option<String>, Vec<u8>)> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    Ok((file_name, bytes))
}

/// Map an error to its status code and JSON body.
fn reject(err: ServerError) -> ApiError {
    let status = match &err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(
            PipelineError::Csv(_) | PipelineError::Parse(_) | PipelineError::EmptyInput,
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let stage = match &err {
        ServerError::Pipeline(e) => e.stage().map(|s| s.slug()),
        _ => None,
    };
    (status, Json(error_response(&err.to_string(), stage)))
}
