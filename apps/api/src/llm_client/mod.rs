/// LLM Client: the single point of entry for all Gemini API calls in Gradebook.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// Services depend on the `Generator` trait and receive an `Arc<dyn Generator>`
/// through `AppState`, so tests can substitute a scripted fake.
///
/// Every call is a single attempt. A failed call is surfaced to the caller
/// immediately; nothing in the service retries generation.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

#[cfg(test)]
pub mod fake;
pub mod fenced;
pub mod prompts;

/// Mime type requested for every text reply.
pub const TEXT_PLAIN: &str = "text/plain";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("prompt was blocked by the model: {reason}")]
    Blocked { reason: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// An image attached to a generation request as inline base64 data.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub base64_data: String,
}

/// Everything the remote model needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub response_mime_type: String,
    pub image: Option<InlineImage>,
    pub web_search: bool,
}

impl GenerationRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature,
            response_mime_type: TEXT_PLAIN.to_string(),
            image: None,
            web_search: false,
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        // The API rejects a response mime type when tools are enabled.
        self.response_mime_type.clear();
        self
    }
}

/// The seam between the service and the remote model: `generate(prompt, config) -> text`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (generateContent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart<'a> {
    Text(&'a str),
    InlineData(GeminiBlob<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    response_mime_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GeminiResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The production `Generator`: wraps the Gemini generateContent REST API.
/// Built once at start-up; the inner `reqwest::Client` is shared across calls.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.llm_timeout_secs))
                .build()?,
            api_url: config.gemini_api_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
        })
    }

    /// Makes a raw call to the Gemini API, returning the full response object.
    pub async fn call(&self, request: &GenerationRequest) -> Result<GeminiResponse, LlmError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            parts.push(GeminiPart::InlineData(GeminiBlob {
                mime_type: &image.mime_type,
                data: &image.base64_data,
            }));
        }
        parts.push(GeminiPart::Text(&request.prompt));

        let tools = if request.web_search {
            vec![GeminiTool {
                google_search: serde_json::Map::new(),
            }]
        } else {
            Vec::new()
        };

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: &request.response_mime_type,
            },
            tools,
        };

        let url = format!("{}/models/{}:generateContent", self.api_url, request.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse error message
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                "LLM call succeeded: model={}, prompt_tokens={}, output_tokens={}",
                request.model, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(gemini_response)
    }
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let response = self.call(request).await?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(LlmError::Blocked { reason });
        }

        if let Some(reason) = response.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            if reason != "STOP" {
                debug!("LLM finished with reason {reason}");
            }
        }

        response
            .text()
            .map(|t| t.trim().to_string())
            .ok_or(LlmError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_concatenates_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "```json\n[1,"}, {"text": "2]\n```"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
        }"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("```json\n[1,2]\n```"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert!(response.text().is_none());
        assert_eq!(
            response.prompt_feedback.unwrap().block_reason.as_deref(),
            Some("SAFETY")
        );
    }

    #[test]
    fn test_request_serializes_inline_image_before_text() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![
                    GeminiPart::InlineData(GeminiBlob {
                        mime_type: "image/jpeg",
                        data: "AAAA",
                    }),
                    GeminiPart::Text("read this"),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: TEXT_PLAIN,
            },
            tools: vec![],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(value["contents"][0]["parts"][1]["text"], "read this");
        assert_eq!(value["generationConfig"]["responseMimeType"], "text/plain");
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_web_search_request_drops_mime_type() {
        let request = GenerationRequest::text("gemini-2.5-flash", "write an item", 0.7).with_web_search();
        assert!(request.web_search);
        assert!(request.response_mime_type.is_empty());

        let body = GeminiRequest {
            contents: vec![],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: &request.response_mime_type,
            },
            tools: vec![GeminiTool {
                google_search: serde_json::Map::new(),
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value["generationConfig"].get("responseMimeType").is_none());
        assert!(value["tools"][0]["googleSearch"].is_object());
    }
}
