//! Relay server: holds the Gemini credential so clients don't need it.
//!
//! Routes:
//! - POST /api/analyze-image (also /.netlify/functions/analyze-image)
//!   `{imageData, currentStep}` → normalized result JSON, or `{error}`
//! - GET  /api/version      → build info + whether a key is configured
//! - GET  /api/debug-gemini → text-only ping to the model
//! - GET  /health

use crate::capture::CapturedImage;
use crate::config::{CredentialSource, Settings};
use crate::llm::gemini::PingReport;
use crate::llm::{AnalysisError, AnalysisRequest, AnalysisResult, GeminiClient, MISSING_KEY};
use crate::pipeline::run_analysis;
use crate::workflow::Stage;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Camera frames arrive base64-encoded; allow well above axum's 2 MB default.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct RelayState {
    client: GeminiClient,
    credential_source: Option<CredentialSource>,
    timeout: Duration,
}

impl RelayState {
    pub fn new(client: GeminiClient, credential_source: Option<CredentialSource>, timeout: Duration) -> Self {
        Self {
            client,
            credential_source,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let credential = crate::config::resolve_credential();
        let source = credential.as_ref().map(|c| c.source);
        let client = GeminiClient::from_settings(settings, credential.map(|c| c.key));
        Self::new(client, source, settings.request_timeout())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    image_data: Option<String>,
    current_step: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: &'static str,
    pub timestamp: String,
    pub has_api_key: bool,
    pub api_key_source: &'static str,
}

/// `{error}` body with a status code.
#[derive(Debug)]
pub struct RelayError {
    status: StatusCode,
    message: String,
}

impl RelayError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: Arc<RelayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let analyze = post(analyze_image).fallback(method_not_allowed);

    Router::new()
        .route("/api/analyze-image", analyze.clone())
        .route("/.netlify/functions/analyze-image", analyze)
        .route("/api/version", get(version))
        .route("/api/debug-gemini", get(debug_gemini))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<RelayState>, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let has_key = state.client.has_api_key();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("[RELAY] Listening on http://{}", listener.local_addr()?);
    log::info!("[RELAY]   Analyze: POST /api/analyze-image");
    log::info!("[RELAY]   Health:  GET  /health");
    if !has_key {
        log::warn!("[RELAY] No Gemini key configured, analyze requests will fail");
    }
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// POST /api/analyze-image
async fn analyze_image(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalysisResult>, RelayError> {
    let Json(body) = payload.map_err(|e| {
        log::warn!("[RELAY] Rejected body: {}", e);
        RelayError::bad_request("Request body must be JSON with imageData and currentStep")
    })?;

    let image_data = body
        .image_data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| RelayError::bad_request("Image data is required"))?;
    let stage: Stage = body
        .current_step
        .unwrap_or_default()
        .parse()
        .map_err(|e: crate::workflow::UnknownStage| RelayError::bad_request(e.to_string()))?;

    if !state.client.has_api_key() {
        log::error!("[RELAY] Analyze request but no API key configured");
        return Err(RelayError::internal(MISSING_KEY));
    }

    let image = CapturedImage::from_data_url(&image_data).map_err(|e| {
        log::warn!("[RELAY] {}", e);
        RelayError::bad_request(format!("Invalid image data: {}", e))
    })?;
    log::info!("[RELAY] {} request, {} ({} bytes)", stage, image.mime_type(), image.len());

    let start = std::time::Instant::now();
    match run_analysis(&state.client, AnalysisRequest::new(stage, image), state.timeout).await {
        Ok((result, path)) => {
            log::info!(
                "[RELAY] {} analyzed via {:?} in {}ms",
                stage,
                path,
                start.elapsed().as_millis()
            );
            Ok(Json(result))
        }
        Err(AnalysisError::Configuration(_)) => Err(RelayError::internal(MISSING_KEY)),
        Err(e) => {
            log::error!("[RELAY] Error analyzing image: {}", e);
            Err(RelayError::internal("Failed to analyze image"))
        }
    }
}

async fn method_not_allowed() -> RelayError {
    RelayError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        message: "Method not allowed".to_string(),
    }
}

/// GET /api/version
async fn version(State(state): State<Arc<RelayState>>) -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: unix_timestamp(),
        has_api_key: state.client.has_api_key(),
        api_key_source: state.credential_source.map_or("none", |s| s.as_str()),
    })
}

/// GET /api/debug-gemini
async fn debug_gemini(State(state): State<Arc<RelayState>>) -> Result<Json<PingReport>, RelayError> {
    match state.client.ping().await {
        Ok(report) => Ok(Json(report)),
        Err(AnalysisError::Configuration(_)) => Err(RelayError::internal(MISSING_KEY)),
        Err(e) => Err(RelayError::internal(e.to_string())),
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn unix_timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("unix:{}", secs)
}
