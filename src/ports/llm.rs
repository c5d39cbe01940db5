//! LLM client port for text completions.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future type alias used by [`LlmClient`] to keep the trait dyn-compatible.
pub type LlmFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

/// A request to generate a completion from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model identifier (e.g. `"gemini-2.0-flash"`).
    pub model: String,
    /// The prompt text.
    pub prompt: String,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Builds a request with the default output budget and a low temperature.
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { model: model.into(), prompt: prompt.into(), max_tokens: 65_536, temperature: 0.2 }
    }
}

/// The response from an LLM completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text.
    pub text: String,
    /// Number of prompt tokens consumed.
    pub prompt_tokens: u32,
    /// Number of completion tokens generated.
    pub completion_tokens: u32,
}

/// Failure modes of a single completion call.
///
/// The variants separate transient failures (worth retrying against the
/// same model) from permanent ones (move on to the next model or stop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LlmError {
    /// No API key is configured.
    #[error("LLM API key is missing")]
    MissingApiKey,
    /// HTTP 429.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Response body excerpt.
        message: String,
    },
    /// HTTP 500 or 503.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },
    /// The request did not complete within its timeout.
    #[error("request timed out")]
    Timeout,
    /// HTTP 400.
    #[error("bad request: {message}")]
    BadRequest {
        /// Response body excerpt.
        message: String,
    },
    /// Any other non-success HTTP status.
    #[error("unexpected status {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },
    /// The provider refused the prompt.
    #[error("prompt blocked: {reason}")]
    Blocked {
        /// Provider-supplied block reason.
        reason: String,
    },
    /// The response carried no usable text.
    #[error("empty or malformed response: {message}")]
    Empty {
        /// What was missing.
        message: String,
    },
    /// Connection-level failure.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error text.
        message: String,
    },
}

impl LlmError {
    /// Returns `true` for failures that should be retried against the same model.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Timeout | Self::Transport { .. }
        )
    }
}

/// Sends completion requests to a language model.
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given request.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] describing why the call failed.
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_>;
}
