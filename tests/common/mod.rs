#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use task_agent::agent::{Agent, AgentSettings};
use task_agent::llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError, Role};
use task_agent::tools::{Database, Sandbox, ToolContext, ToolRegistry, WeatherEndpoints};
use tempfile::TempDir;

/// A model whose reply is computed from the conversation so far.
pub struct ScriptedModel<F> {
    respond: F,
}

impl<F> ScriptedModel<F>
where
    F: Fn(&[ChatMessage]) -> ChatResponse + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> LlmClient for ScriptedModel<F>
where
    F: Fn(&[ChatMessage]) -> ChatResponse + Send + Sync,
{
    async fn chat_completion(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        Ok((self.respond)(request.messages))
    }
}

/// Decoded payloads of every tool reply in the conversation.
pub fn tool_payloads(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.content.as_deref())
        .filter_map(|content| serde_json::from_str(content).ok())
        .collect()
}

pub struct Harness {
    pub dir: TempDir,
    pub sandbox: Arc<Sandbox>,
    pub tools: Arc<ToolRegistry>,
}

impl Harness {
    /// Built-in tools over a fresh sandbox and an in-memory demo database.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let sandbox = Arc::new(Sandbox::open(dir.path().join("sandbox")).unwrap());
        let database = Arc::new(Database::open_in_memory().unwrap());
        let tools = ToolRegistry::with_builtin_tools(ToolContext {
            sandbox: Arc::clone(&sandbox),
            database,
            http: reqwest::Client::new(),
            weather: WeatherEndpoints {
                geocoding_url: "http://127.0.0.1:1/search".to_string(),
                forecast_url: "http://127.0.0.1:1/forecast".to_string(),
            },
        });

        Self {
            dir,
            sandbox,
            tools: Arc::new(tools),
        }
    }

    pub fn agent(&self, llm: Arc<dyn LlmClient>) -> Agent {
        Agent::new(llm, Arc::clone(&self.tools), AgentSettings::default())
    }
}
