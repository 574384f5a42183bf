//! Relay client: sends the image to a relay that holds the credential.
//!
//! Wire shape: `POST {imageData: dataURL, currentStep}`. The relay answers
//! with already-normalized JSON; it is passed back as reply text, which
//! the normalizer parses again unchanged.

use super::provider::{AnalysisBackend, AnalysisError, AnalysisRequest, MISSING_KEY};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub image_data: String,
    pub current_step: String,
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    url: String,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[LLM] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            url: url.to_string(),
            client,
        }
    }
}

#[async_trait]
impl AnalysisBackend for RelayClient {
    fn id(&self) -> &str {
        "relay"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let body = RelayRequest {
            image_data: request.image().to_data_url(),
            current_step: request.stage().to_string(),
        };
        let start = std::time::Instant::now();

        let response = self.client.post(&self.url).json(&body).send().await.map_err(|e| {
            log::error!("[LLM] Relay request failed: {}", e);
            AnalysisError::Transport(e)
        })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = relay_error_message(&text).unwrap_or(text);
            log::error!("[LLM] Relay returned {}: {}", status, message);
            if message == MISSING_KEY {
                return Err(AnalysisError::Configuration(message));
            }
            return Err(AnalysisError::Network {
                status: status.as_u16(),
                body: message,
            });
        }

        log::info!("[LLM] Relay latency: {}ms", start.elapsed().as_millis());
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyReply);
        }
        Ok(text)
    }
}

/// The `error` field of a relay error body, if it has one.
fn relay_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("error")?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_browser_field_names() {
        let body = RelayRequest {
            image_data: "data:image/jpeg;base64,AAAA".into(),
            current_step: "cooking".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["imageData"], "data:image/jpeg;base64,AAAA");
        assert_eq!(json["currentStep"], "cooking");
    }

    #[test]
    fn error_message_is_extracted() {
        assert_eq!(
            relay_error_message(r#"{"error":"API key not configured"}"#).as_deref(),
            Some("API key not configured")
        );
        assert!(relay_error_message("Bad Gateway").is_none());
    }

    #[tokio::test]
    async fn keyless_relay_reply_is_configuration_error() {
        use axum::http::StatusCode;
        use axum::routing::post;

        let app = axum::Router::new().route(
            "/analyze",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "error": MISSING_KEY })),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let client = RelayClient::new(&format!("http://{addr}/analyze"), Duration::from_secs(5));
        let image = crate::capture::CapturedImage::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg");
        let err = client
            .analyze(&AnalysisRequest::new(crate::workflow::Stage::Cooking, image))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(ref m) if m == MISSING_KEY));
    }
}
