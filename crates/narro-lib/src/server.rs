//! HTTP API for the narro pipeline.
//!
//! CORS-permissive so the web app and browser extension can call it from any
//! origin. Generated audio is served from the same process under `/audio`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode, header::HOST};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use narro_core::types::{AUDIO_PATH_SEGMENT, ErrorBody, ExtractionRequest, Health, ServerConfig};

use crate::pipeline::{Pipeline, PipelineError};

/// Request bodies above this size are rejected.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    public_url: Option<String>,
}

impl AppState {
    /// Configured public URL, else the origin the client addressed.
    fn public_base(&self, headers: &HeaderMap) -> String {
        if let Some(url) = self.public_url.as_deref() {
            return url.to_string();
        }
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{host}")
    }
}

/// Build the axum router around a shared [`Pipeline`].
///
/// Audio is served from the pipeline's audio directory.
pub fn router(pipeline: Arc<Pipeline>, config: &ServerConfig) -> Router {
    let audio = ServeDir::new(pipeline.audio_dir());
    let state = AppState {
        pipeline,
        public_url: config.public_url.clone(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/save", post(save))
        .nest_service(&format!("/{AUDIO_PATH_SEGMENT}"), audio)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Pull `url` out of a JSON body. Anything but a string field is rejected.
fn parse_save_request(body: &[u8]) -> Option<ExtractionRequest> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let url = value.get("url")?.as_str()?;
    Some(ExtractionRequest {
        url: url.to_string(),
    })
}

// ─── Handlers ──────────────────────────────────────────────────────────────

async fn health() -> Json<Health> {
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    Json(Health { ok: true, t })
}

async fn save(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(request) = parse_save_request(&body) else {
        return error_response(StatusCode::BAD_REQUEST, PipelineError::Validation.to_string());
    };

    let base = state.public_base(&headers);
    match state.pipeline.run(&request, &base).await {
        Ok(saved) => Json(saved).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                error!(url = %request.url, "save failed: {err}");
            } else {
                warn!(url = %request.url, "save rejected: {err}");
            }
            error_response(status, err.to_string())
        }
    }
}
