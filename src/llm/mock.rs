//! Scripted LLM client for tests.
//!
//! Replies are handed out in order, one per `chat_completion` call. Once the
//! script runs out the optional fallback reply is repeated, which is how
//! tests drive the agent into its iteration cap. Every request is recorded so
//! tests can inspect exactly what the model was shown.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError};

enum Reply {
    Response(ChatResponse),
    Error(String),
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
    pub max_tokens: u32,
}

#[derive(Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<ChatResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn then_reply(self, response: ChatResponse) -> Self {
        self.push(Reply::Response(response));
        self
    }

    /// Queue a failed model call.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Reply::Error(message.into()));
        self
    }

    /// Reply used whenever the script is exhausted.
    pub fn otherwise(mut self, response: ChatResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat_completion(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                model: request.model.to_string(),
                messages: request.messages.to_vec(),
                tool_names: request
                    .tools
                    .iter()
                    .map(|t| t.function.name.clone())
                    .collect(),
                max_tokens: request.max_tokens,
            });
        }

        let next = self
            .script
            .lock()
            .map_err(|_| LlmError::InvalidResponse("mock script poisoned".to_string()))?
            .pop_front();

        match next {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Error(message)) => Err(LlmError::Api {
                status: 500,
                message,
            }),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::InvalidResponse("mock script exhausted".to_string())),
        }
    }
}
