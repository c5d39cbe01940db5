use std::collections::VecDeque;
use std::sync::Mutex;

use crate::ports::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmFuture};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

/// LLM that answers from a queue, a fixed reply, or a closure.
pub struct ScriptedLlm {
    queue: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            queue: Mutex::new(replies.into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: Result<String, LlmError>) -> Self {
        Self::from_fn(move |_| reply.clone())
    }

    pub fn from_fn(
        f: impl Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.model).collect()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.queue.lock().unwrap().pop_front();
        let reply = match (queued, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(request),
            (None, None) => {
                Err(LlmError::Server { status: 503, message: "script exhausted".into() })
            }
        };
        Box::pin(async move {
            reply.map(|text| CompletionResponse { text, prompt_tokens: 0, completion_tokens: 0 })
        })
    }
}
