//! Gemini `generateContent` client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::truncate_chars;
use crate::ports::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmFuture};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const ERROR_EXCERPT: usize = 300;

/// Generation backend over the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// A client for `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    ///
    /// A missing key is only reported when a completion is requested.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<Usage>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Usage {
    prompt_token_count: u32,
    candidates_token_count: u32,
}

fn status_error(status: StatusCode, body: &str) -> LlmError {
    let message = truncate_chars(body, ERROR_EXCERPT).to_string();
    match status.as_u16() {
        429 => LlmError::RateLimited { message },
        500 | 503 => LlmError::Server { status: status.as_u16(), message },
        400 => LlmError::BadRequest { message },
        code => LlmError::Http { status: code, message },
    }
}

fn transport_error(error: &reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport { message: error.to_string() }
    }
}

fn extract_text(response: GenerateResponse) -> Result<CompletionResponse, LlmError> {
    let usage = response.usage_metadata.unwrap_or_default();
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => LlmError::Blocked { reason },
            None => LlmError::Empty { message: "no candidates in response".to_string() },
        });
    };
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(LlmError::Empty { message: "candidate had no text".to_string() });
    }
    Ok(CompletionResponse {
        text,
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
    })
}

impl LlmClient for GeminiClient {
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
            let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
            let body = GenerateRequest {
                contents: [Content { parts: [Part { text: &request.prompt }] }],
                generation_config: GenerationConfig {
                    max_output_tokens: request.max_tokens,
                    temperature: request.temperature,
                },
            };

            debug!(model = %request.model, chars = request.prompt.len(), "gemini request");
            let response = self
                .client
                .post(&url)
                .query(&[("key", api_key)])
                .timeout(REQUEST_TIMEOUT)
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error(&e))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| transport_error(&e))?;
            if !status.is_success() {
                return Err(status_error(status, &text));
            }
            let parsed: GenerateResponse = serde_json::from_str(&text)
                .map_err(|e| LlmError::Empty { message: format!("unreadable response: {e}") })?;
            extract_text(parsed)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::new("gemini-2.0-flash", "hello")
    }

    #[tokio::test]
    async fn returns_candidate_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "k"))
            .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 65536}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "<file path=\"a.py\">x</file>"}]}}],
                "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 9}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(server.uri(), Some("k".into()));
        let response = client.complete(&request()).await.unwrap();
        assert!(response.text.starts_with("<file"));
        assert_eq!((response.prompt_tokens, response.completion_tokens), (3, 9));
    }

    #[tokio::test]
    async fn maps_statuses_to_error_kinds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(server.uri(), Some("k".into()));
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err, LlmError::RateLimited { message: "quota".into() });
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn blocked_prompt_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(server.uri(), Some("k".into()));
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err, LlmError::Blocked { reason: "SAFETY".into() });
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new("http://127.0.0.1:9", None);
        assert_eq!(client.complete(&request()).await.unwrap_err(), LlmError::MissingApiKey);
    }
}
