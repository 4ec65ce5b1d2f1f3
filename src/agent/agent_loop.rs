//! Core agent loop implementation.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::llm::{ChatMessage, ChatRequest, LlmClient, LlmError, ToolCall, ToolChoice};
use crate::task::{ExecutionStep, SharedTask, TaskStatus};
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;

/// Result text used when the model ends with an empty message.
const EMPTY_ANSWER: &str = "Task completed";

/// Loop-level limits and model selection.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_iterations: usize,
    pub max_tokens: u32,
    /// Run a round's tool calls concurrently instead of one after another.
    pub parallel_tool_calls: bool,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default_model.clone(),
            max_iterations: config.max_iterations,
            max_tokens: config.max_tokens,
            parallel_tool_calls: config.parallel_tool_calls,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "openai/gpt-oss-120b".to_string(),
            max_iterations: 10,
            max_tokens: 1000,
            parallel_tool_calls: false,
        }
    }
}

/// Why a run ended in `failed`.
#[derive(Debug, Error)]
enum LoopFailure {
    #[error("Maximum iterations reached")]
    MaxIterations,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// The task agent. One instance is shared by every worker.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, settings: AgentSettings) -> Self {
        Self {
            llm,
            tools,
            settings,
        }
    }

    /// Drive `task` from `pending` to a terminal status and return that status.
    ///
    /// A task that is not pending is left untouched.
    pub async fn execute_task(&self, task: &SharedTask) -> TaskStatus {
        let (task_id, prompt) = {
            let mut guard = task.write().await;
            if let Err(e) = guard.mark_running() {
                tracing::warn!("Refusing to execute task {}: {}", guard.id(), e);
                return guard.status();
            }
            (guard.id().to_string(), guard.prompt().to_string())
        };

        tracing::info!("Task {} started", task_id);
        let outcome = self.run_loop(task, &task_id, &prompt).await;

        let mut guard = task.write().await;
        let transition = match outcome {
            Ok(answer) => {
                tracing::info!("Task {} completed after {} iteration(s)", task_id, guard.iterations());
                guard.push_step(ExecutionStep::final_answer(answer.clone()));
                guard.complete(answer)
            }
            Err(LoopFailure::MaxIterations) => {
                tracing::warn!("Task {} hit the iteration cap", task_id);
                let message = LoopFailure::MaxIterations.to_string();
                guard.push_step(ExecutionStep::final_answer(format!("Error: {}", message)));
                guard.fail(message)
            }
            Err(LoopFailure::Llm(e)) => {
                tracing::error!("Task {} failed on model call: {}", task_id, e);
                guard.push_step(ExecutionStep::final_answer(format!("Error: {}", e)));
                guard.fail(e.to_string())
            }
        };
        if let Err(e) = transition {
            tracing::error!("Task {} could not be finalized: {}", task_id, e);
        }

        guard.status()
    }

    async fn run_loop(
        &self,
        task: &SharedTask,
        task_id: &str,
        prompt: &str,
    ) -> Result<String, LoopFailure> {
        let mut messages = vec![
            ChatMessage::system(build_system_prompt(&self.tools)),
            ChatMessage::user(prompt),
        ];
        let tool_schemas = self.tools.get_tool_schemas();

        for _ in 0..self.settings.max_iterations {
            let iteration = task.write().await.record_iteration();
            tracing::debug!("Task {} iteration {}", task_id, iteration);

            let request = ChatRequest {
                model: &self.settings.model,
                messages: &messages,
                tools: &tool_schemas,
                tool_choice: ToolChoice::Auto,
                max_tokens: self.settings.max_tokens,
            };
            let response = self.llm.chat_completion(&request).await?;
            messages.push(response.to_message());

            let calls = response.requested_calls();
            if calls.is_empty() {
                let answer = response
                    .content
                    .filter(|content| !content.trim().is_empty())
                    .unwrap_or_else(|| EMPTY_ANSWER.to_string());
                return Ok(answer);
            }

            let replies = if self.settings.parallel_tool_calls {
                join_all(calls.iter().map(|call| self.run_tool_call(task, call))).await
            } else {
                let mut replies = Vec::with_capacity(calls.len());
                for call in calls {
                    replies.push(self.run_tool_call(task, call).await);
                }
                replies
            };
            messages.extend(replies.into_iter().flatten());
        }

        Err(LoopFailure::MaxIterations)
    }

    /// Execute one requested call and produce the tool message answering it.
    ///
    /// Returns `None` when the argument payload is not valid JSON; such calls
    /// leave no step and no message behind.
    async fn run_tool_call(&self, task: &SharedTask, call: &ToolCall) -> Option<ChatMessage> {
        let name = call.function.name.as_str();
        let args = match parse_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(
                    "Skipping tool call {} ({}): unparseable arguments: {}",
                    call.id,
                    name,
                    e
                );
                return None;
            }
        };

        tracing::info!("Calling tool {} ({})", name, call.id);
        task.write()
            .await
            .push_step(ExecutionStep::tool_call(name, args.clone()));

        let (summary, output) = match self.tools.execute(name, args).await {
            Ok(output) => (format!("Tool {} completed", name), output),
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", name, e);
                (
                    format!("Tool {} failed: {}", name, e),
                    json!({ "error": e.to_string() }),
                )
            }
        };

        let reply = ChatMessage::tool(call.id.clone(), output.to_string());
        task.write()
            .await
            .push_step(ExecutionStep::tool_result(name, summary, output));
        Some(reply)
    }
}

/// Decode a model-supplied argument string. Blank means no arguments.
fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
}
