//! Text generation over the LLM port with per-model retries and a model
//! fallback chain.

use std::time::Duration;

use crate::config::Timings;
use crate::ports::llm::{CompletionRequest, LlmClient, LlmError};

/// Attempts made against one model before moving to the next.
pub const ATTEMPTS_PER_MODEL: u32 = 4;

/// Terminal failure of a generation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Every model in the chain failed.
    #[error("all generation models failed (tried: {}): {last_error}", models_tried.join(", "))]
    BackendExhausted {
        /// Models attempted, in order.
        models_tried: Vec<String>,
        /// The last failure seen.
        last_error: String,
    },
    /// The provider refused the prompt.
    #[error("prompt blocked by provider: {reason}")]
    Blocked {
        /// Provider-supplied block reason.
        reason: String,
    },
    /// The backend is not configured.
    #[error("generation backend misconfigured: {0}")]
    Configuration(String),
}

/// Safe prompt size in characters for a model.
#[must_use]
pub fn model_char_budget(model: &str) -> usize {
    match model {
        "gemini-3-flash-preview" => 700_000,
        "gemini-3-pro-preview" | "gemini-1.5-pro" => 1_400_000,
        "gemini-2.0-flash" | "gemini-2.0-flash-exp" | "gemini-1.5-flash" => 600_000,
        _ => 400_000,
    }
}

/// Models tried in order when `primary` fails; `primary` comes first.
#[must_use]
pub fn fallback_chain(primary: &str) -> Vec<String> {
    let fallbacks: &[&str] = match primary {
        "gemini-3-flash-preview" => &["gemini-2.0-flash", "gemini-1.5-flash"],
        "gemini-3-pro-preview" => &["gemini-3-flash-preview", "gemini-2.0-flash", "gemini-1.5-pro"],
        "gemini-2.0-flash" | "gemini-2.0-flash-exp" => &["gemini-1.5-flash", "gemini-1.5-pro"],
        "gemini-1.5-flash" => &["gemini-2.0-flash", "gemini-1.5-pro"],
        "gemini-1.5-pro" => &["gemini-2.0-flash", "gemini-1.5-flash"],
        _ => &["gemini-3-flash-preview", "gemini-2.0-flash", "gemini-1.5-flash"],
    };
    std::iter::once(primary)
        .chain(fallbacks.iter().copied().filter(|m| *m != primary))
        .map(ToString::to_string)
        .collect()
}

/// Issues prompts against the LLM port, hiding transient failures.
pub struct GenerationClient<'a> {
    llm: &'a dyn LlmClient,
    timings: &'a Timings,
}

impl<'a> GenerationClient<'a> {
    /// Wraps an LLM port.
    #[must_use]
    pub fn new(llm: &'a dyn LlmClient, timings: &'a Timings) -> Self {
        Self { llm, timings }
    }

    /// Wait before retrying a transient failure: exponential for rate limits,
    /// none after a timeout, linear otherwise.
    fn backoff(&self, error: &LlmError, attempt: u32) -> Duration {
        match error {
            LlmError::RateLimited { .. } => self.timings.llm_retry_base * 2u32.pow(attempt),
            LlmError::Timeout => Duration::ZERO,
            _ => self.timings.llm_retry_base * (attempt + 1),
        }
    }

    /// Generates text for `prompt`, starting with `primary` and walking its
    /// fallback chain.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::BackendExhausted`] when every model fails,
    /// [`GenerationError::Blocked`] when the prompt is refused, and
    /// [`GenerationError::Configuration`] when no API key is set.
    pub async fn generate(&self, prompt: &str, primary: &str) -> Result<String, GenerationError> {
        let mut models_tried = Vec::new();
        let mut last_error = String::from("no models attempted");

        for model in fallback_chain(primary) {
            models_tried.push(model.clone());
            let request = CompletionRequest::new(&model, prompt);

            for attempt in 0..ATTEMPTS_PER_MODEL {
                tracing::debug!(
                    %model,
                    attempt = attempt + 1,
                    chars = prompt.len(),
                    "completion request"
                );
                let error = match self.llm.complete(&request).await {
                    Ok(response) if !response.text.trim().is_empty() => return Ok(response.text),
                    Ok(_) => LlmError::Empty { message: "no text in response".to_string() },
                    Err(error) => error,
                };
                last_error = format!("{model}: {error}");

                match &error {
                    LlmError::MissingApiKey => {
                        return Err(GenerationError::Configuration(error.to_string()))
                    }
                    LlmError::Blocked { reason } => {
                        return Err(GenerationError::Blocked { reason: reason.clone() })
                    }
                    _ if !error.is_transient() => {
                        tracing::warn!(%model, %error, "model failed, trying next");
                        break;
                    }
                    _ => {}
                }
                if attempt + 1 < ATTEMPTS_PER_MODEL {
                    let wait = self.backoff(&error, attempt);
                    tracing::warn!(
                        %model,
                        %error,
                        wait_secs = wait.as_secs(),
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        Err(GenerationError::BackendExhausted { models_tried, last_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::ScriptedLlm;

    #[test]
    fn chain_never_repeats_primary() {
        assert_eq!(
            fallback_chain("gemini-3-pro-preview"),
            vec![
                "gemini-3-pro-preview",
                "gemini-3-flash-preview",
                "gemini-2.0-flash",
                "gemini-1.5-pro"
            ]
        );
        let chain = fallback_chain("gemini-3-flash-preview");
        assert_eq!(chain, vec!["gemini-3-flash-preview", "gemini-2.0-flash", "gemini-1.5-flash"]);
        let unknown = fallback_chain("custom-model");
        assert_eq!(unknown.len(), 4);
        assert_eq!(unknown[0], "custom-model");
    }

    #[test]
    fn budgets_follow_model_family() {
        assert_eq!(model_char_budget("gemini-3-flash-preview"), 700_000);
        assert_eq!(model_char_budget("gemini-1.5-pro"), 1_400_000);
        assert_eq!(model_char_budget("something-else"), 400_000);
    }

    #[tokio::test]
    async fn transient_errors_retry_same_model() {
        let llm = ScriptedLlm::new(vec![
            Err(LlmError::RateLimited { message: "slow down".into() }),
            Err(LlmError::Server { status: 503, message: "busy".into() }),
            Ok("done".into()),
        ]);
        let timings = Timings::immediate();
        let client = GenerationClient::new(&llm, &timings);
        let text = client.generate("hi", "gemini-2.0-flash").await.unwrap();
        assert_eq!(text, "done");
        let models = llm.models();
        assert_eq!(models, vec!["gemini-2.0-flash"; 3]);
    }

    #[tokio::test]
    async fn timeouts_and_transport_errors_retry_same_model() {
        let llm = ScriptedLlm::new(vec![
            Err(LlmError::Timeout),
            Err(LlmError::Transport { message: "reset".into() }),
            Err(LlmError::Http { status: 418, message: "teapot".into() }),
            Ok("next model".into()),
        ]);
        let timings = Timings::immediate();
        let client = GenerationClient::new(&llm, &timings);
        assert_eq!(client.generate("hi", "gemini-2.0-flash").await.unwrap(), "next model");
        assert_eq!(
            llm.models(),
            vec!["gemini-2.0-flash", "gemini-2.0-flash", "gemini-2.0-flash", "gemini-1.5-flash"]
        );
    }

    #[test]
    fn backoff_is_exponential_for_rate_limits_only() {
        let llm = ScriptedLlm::new(Vec::new());
        let timings = Timings { llm_retry_base: Duration::from_secs(2), ..Timings::immediate() };
        let client = GenerationClient::new(&llm, &timings);
        let limited = LlmError::RateLimited { message: String::new() };
        let server = LlmError::Server { status: 503, message: String::new() };
        assert_eq!(client.backoff(&limited, 2), Duration::from_secs(8));
        assert_eq!(client.backoff(&server, 2), Duration::from_secs(6));
        assert_eq!(client.backoff(&LlmError::Timeout, 2), Duration::ZERO);
    }

    #[tokio::test]
    async fn permanent_errors_move_down_the_chain() {
        let llm = ScriptedLlm::new(vec![
            Err(LlmError::BadRequest { message: "too long".into() }),
            Ok(String::new()),
            Ok("from third".into()),
        ]);
        let timings = Timings::immediate();
        let client = GenerationClient::new(&llm, &timings);
        let text = client.generate("hi", "gemini-2.0-flash").await.unwrap();
        assert_eq!(text, "from third");
        assert_eq!(llm.models(), vec!["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro"]);
    }

    #[tokio::test]
    async fn exhausted_chain_lists_models() {
        let llm =
            ScriptedLlm::always(Err(LlmError::Server { status: 500, message: "down".into() }));
        let timings = Timings::immediate();
        let client = GenerationClient::new(&llm, &timings);
        let err = client.generate("hi", "gemini-1.5-flash").await.unwrap_err();
        match err {
            GenerationError::BackendExhausted { models_tried, .. } => {
                let expected = vec!["gemini-1.5-flash", "gemini-2.0-flash", "gemini-1.5-pro"];
                assert_eq!(models_tried, expected);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(llm.models().len(), 3 * ATTEMPTS_PER_MODEL as usize);
    }

    #[tokio::test]
    async fn missing_key_and_blocked_stop_immediately() {
        let timings = Timings::immediate();
        let llm = ScriptedLlm::always(Err(LlmError::MissingApiKey));
        let err = GenerationClient::new(&llm, &timings).generate("hi", "gemini-2.0-flash").await;
        assert!(matches!(err, Err(GenerationError::Configuration(_))));
        assert_eq!(llm.models().len(), 1);

        let llm = ScriptedLlm::always(Err(LlmError::Blocked { reason: "SAFETY".into() }));
        let err = GenerationClient::new(&llm, &timings).generate("hi", "gemini-2.0-flash").await;
        assert_eq!(err, Err(GenerationError::Blocked { reason: "SAFETY".into() }));
    }
}
