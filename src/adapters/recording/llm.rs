use serde_json::{json, Value};

use crate::cassette::ports::LLM;
use crate::cassette::session::{record, SharedRecorder};
use crate::ports::llm::{CompletionRequest, LlmClient, LlmFuture};

/// Records completions; errors keep their typed form so replay can retry on them.
pub struct RecordingLlmClient {
    inner: Box<dyn LlmClient>,
    recorder: SharedRecorder,
}

impl RecordingLlmClient {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn LlmClient>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl LlmClient for RecordingLlmClient {
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let result = self.inner.complete(&request).await;
            let output = match &result {
                Ok(response) => json!({ "ok": response }),
                Err(e) => json!({ "err": serde_json::to_value(e).unwrap_or(Value::Null) }),
            };
            let input = json!({
                "model": request.model,
                "prompt_chars": request.prompt.chars().count(),
            });
            record(&self.recorder, LLM, "complete", input, output);
            result
        })
    }
}
