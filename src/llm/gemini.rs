//! Gemini `generateContent` client: image + prompt in, reply text out.
//!
//! Key details:
//! - API key goes in the `x-goog-api-key` header, never the URL
//! - the image travels inline as base64 (`inline_data`), not by URL
//! - reply text lives at `candidates[0].content.parts[*].text`
//! - no retries: any non-2xx status is returned as `AnalysisError::Network`

use super::prompts::{self, select_prompt};
use super::provider::{AnalysisBackend, AnalysisError, AnalysisRequest, MISSING_KEY};
use crate::config::Settings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Bounded sampling so replies stay short and parseable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: prompts::TEMPERATURE,
            top_k: prompts::TOP_K,
            top_p: prompts::TOP_P,
            max_output_tokens: prompts::MAX_OUTPUT_TOKENS,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Outcome of a text-only connectivity check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingReport {
    pub status: u16,
    pub ok: bool,
    pub response_text: String,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    api_base: String,
    model: String,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, api_base: &str, model: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[LLM] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            generation: GenerationConfig::default(),
            client,
        }
    }

    pub fn from_settings(settings: &Settings, api_key: Option<String>) -> Self {
        Self::new(
            api_key,
            &settings.api_base,
            &settings.model,
            settings.request_timeout(),
        )
        .with_generation(settings.generation_config())
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }

    fn api_key(&self) -> Result<&str, AnalysisError> {
        self.api_key.as_deref().ok_or_else(|| {
            AnalysisError::Configuration(MISSING_KEY.to_string())
        })
    }

    async fn generate(&self, request: &GeminiRequest<'_>) -> Result<String, AnalysisError> {
        let api_key = self.api_key()?;
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                log::error!("[LLM] HTTP request failed: {}", e);
                AnalysisError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!(
                "[LLM] Gemini API returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            );
            return Err(AnalysisError::Network {
                status: status.as_u16(),
                body,
            });
        }

        let body: GeminiResponse = response.json().await?;
        log::info!("[LLM] Gemini latency: {}ms", start.elapsed().as_millis());

        reply_text(body).ok_or(AnalysisError::EmptyReply)
    }

    /// Text-only request to check the key and endpoint. Non-2xx statuses
    /// are reported, not treated as errors.
    pub async fn ping(&self) -> Result<PingReport, AnalysisError> {
        let api_key = self.api_key()?;
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part::Text {
                    text: "Hello, respond with just the word 'test'".to_string(),
                }],
            }],
            generation_config: None,
        };
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let response_text = response.text().await.unwrap_or_default();
        log::info!("[LLM] Ping {}: status: {}", self.model, status);
        Ok(PingReport {
            status: status.as_u16(),
            ok: status.is_success(),
            response_text,
        })
    }
}

#[async_trait]
impl AnalysisBackend for GeminiClient {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let image = request.image();
        let prompt = select_prompt(request.stage());

        log::info!("[LLM] Provider: gemini");
        log::info!("[LLM] Model: {}", self.model);
        log::info!(
            "[LLM] Stage: {}, image: {} ({} bytes)",
            request.stage(),
            image.mime_type(),
            image.len()
        );

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.text(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type(),
                            data: image.to_base64(),
                        },
                    },
                ],
            }],
            generation_config: Some(self.generation),
        };

        self.generate(&body).await
    }
}

/// Concatenate the text parts of the first candidate.
fn reply_text(response: GeminiResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_wire_shape() {
        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "p".into() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: "AAAA".into(),
                        },
                    },
                ],
            }],
            generation_config: Some(GenerationConfig::default()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "p");
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "AAAA");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn reply_text_joins_parts_of_first_candidate() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}},
                              {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(response).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn missing_candidates_is_empty_reply() {
        let response: GeminiResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(reply_text(response).is_none());

        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(reply_text(blocked).is_none());
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error() {
        let client = GeminiClient::new(None, DEFAULT_API_BASE, "m", Duration::from_secs(1));
        assert!(!client.has_api_key());
        let err = client.ping().await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(
            Some("k".into()),
            "http://localhost:1234/",
            "gemini-x",
            Duration::from_secs(1),
        );
        assert_eq!(
            client.endpoint(),
            "http://localhost:1234/v1beta/models/gemini-x:generateContent"
        );
    }
}
