use std::sync::{Mutex, PoisonError};

use crate::cassette::ports::LLM;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmFuture};

/// Serves recorded completions, including typed errors.
pub struct ReplayingLlmClient {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingLlmClient {
    /// Replays from `replayer`.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl LlmClient for ReplayingLlmClient {
    fn complete(&self, _request: &CompletionRequest) -> LlmFuture<'_> {
        let next = self
            .replayer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_result::<CompletionResponse, LlmError>(LLM, "complete");
        let result = match next {
            Ok(recorded) => recorded,
            Err(replay) => Err(LlmError::Transport { message: replay.to_string() }),
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cassette::format::Cassette;

    #[tokio::test]
    async fn replays_text_then_typed_error() {
        let reply = json!({"ok": {"text": "hi", "prompt_tokens": 1, "completion_tokens": 2}});
        let limited = json!({"err": {"kind": "rate_limited", "message": "slow down"}});
        let cassette =
            Cassette::new("llm").with(LLM, "complete", reply).with(LLM, "complete", limited);
        let llm = ReplayingLlmClient::new(CassetteReplayer::new(&cassette));
        let request = CompletionRequest::new("m", "p");

        assert_eq!(llm.complete(&request).await.unwrap().text, "hi");
        assert_eq!(
            llm.complete(&request).await.unwrap_err(),
            LlmError::RateLimited { message: "slow down".into() }
        );
        assert!(matches!(llm.complete(&request).await.unwrap_err(), LlmError::Transport { .. }));
    }
}
