//! Analysis provider trait: common interface for every backend.
//!
//! The pipeline talks to one `AnalysisBackend`: either Gemini directly or
//! a relay that holds the credential server-side. Which one is decided
//! by configuration in `resolve_backend`.

use crate::capture::CapturedImage;
use crate::config::Settings;
use crate::workflow::Stage;
use async_trait::async_trait;
use std::sync::Arc;

use super::gemini::GeminiClient;
use super::relay_client::RelayClient;

/// One image to analyze for one stage. Immutable once built.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    stage: Stage,
    image: CapturedImage,
}

impl AnalysisRequest {
    pub fn new(stage: Stage, image: CapturedImage) -> Self {
        Self { stage, image }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn image(&self) -> &CapturedImage {
        &self.image
    }
}

/// Error text for a missing credential, also sent by the relay.
pub const MISSING_KEY: &str = "API key not configured";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// No credential to call the model with.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The endpoint answered with a non-success status.
    #[error("analysis endpoint returned {status}: {body}")]
    Network { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analysis timed out after {}ms", .0.as_millis())]
    Timeout(std::time::Duration),
    /// 2xx response without any reply text in it.
    #[error("no reply text in response")]
    EmptyReply,
}

impl AnalysisError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, AnalysisError::Configuration(_))
    }
}

/// Send an image + stage prompt somewhere and get the model's reply text.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Short identifier for logs ("gemini", "relay").
    fn id(&self) -> &str;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}

/// Pick the backend for the current settings.
///
/// A configured relay URL wins; otherwise Gemini is called directly with
/// whatever credential is available (possibly none, which surfaces as a
/// configuration error on first use).
pub fn resolve_backend(settings: &Settings) -> Arc<dyn AnalysisBackend> {
    match settings.relay_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            log::info!("[LLM] Backend: relay at {}", url);
            Arc::new(RelayClient::new(url, settings.request_timeout()))
        }
        None => {
            let credential = crate::config::resolve_credential();
            log::info!(
                "[LLM] Backend: gemini ({}), credential: {}",
                settings.model,
                credential
                    .as_ref()
                    .map_or("none", |c| c.source.as_str())
            );
            Arc::new(GeminiClient::from_settings(
                settings,
                credential.map(|c| c.key),
            ))
        }
    }
}
