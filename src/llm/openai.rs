//! Client for OpenAI-compatible chat-completion APIs.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError};

/// Groq's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat-completion client for any provider speaking the OpenAI wire format.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat_completion(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        tracing::debug!(
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::llm::{ToolChoice, ToolSchema};

    type Captured = Arc<Mutex<Option<Value>>>;

    async fn spawn_provider(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/chat/completions",
                post(
                    move |State(captured): State<Captured>, Json(body): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            *captured.lock().unwrap() = Some(body);
                            (status, Json(reply))
                        }
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/", addr), captured)
    }

    fn schema() -> ToolSchema {
        serde_json::from_value(json!({
            "type": "function",
            "function": {
                "name": "list_files",
                "description": "List all files in the sandbox directory",
                "parameters": {"type": "object", "properties": {}, "required": []}
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn sends_tools_with_auto_choice_and_parses_tool_calls() {
        let (base_url, captured) = spawn_provider(
            StatusCode::OK,
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "list_files", "arguments": "{}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }),
        )
        .await;

        let client = OpenAiCompatibleClient::new("test-key".to_string(), base_url);
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("list files")];
        let tools = vec![schema()];
        let response = client
            .chat_completion(&ChatRequest {
                model: "openai/gpt-oss-120b",
                messages: &messages,
                tools: &tools,
                tool_choice: ToolChoice::Auto,
                max_tokens: 1000,
            })
            .await
            .unwrap();

        assert_eq!(response.requested_calls().len(), 1);
        assert_eq!(response.requested_calls()[0].id, "call_1");
        assert_eq!(response.requested_calls()[0].function.name, "list_files");
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));

        let body = captured.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "openai/gpt-oss-120b");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "list files");
        assert_eq!(body["tools"][0]["function"]["name"], "list_files");
    }

    #[tokio::test]
    async fn api_error_status_is_reported() {
        let (base_url, _) = spawn_provider(
            StatusCode::UNAUTHORIZED,
            json!({"error": {"message": "Invalid API Key"}}),
        )
        .await;

        let client = OpenAiCompatibleClient::new("bad-key".to_string(), base_url);
        let messages = vec![ChatMessage::user("hi")];
        let err = client
            .chat_completion(&ChatRequest {
                model: "m",
                messages: &messages,
                tools: &[],
                tool_choice: ToolChoice::Auto,
                max_tokens: 10,
            })
            .await
            .unwrap_err();

        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Invalid API Key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_invalid() {
        let (base_url, _) = spawn_provider(StatusCode::OK, json!({"choices": []})).await;

        let client = OpenAiCompatibleClient::new("k".to_string(), base_url);
        let messages = vec![ChatMessage::user("hi")];
        let err = client
            .chat_completion(&ChatRequest {
                model: "m",
                messages: &messages,
                tools: &[],
                tool_choice: ToolChoice::Auto,
                max_tokens: 10,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
