//! # Task Agent
//!
//! An autonomous task agent that completes natural-language requests with a
//! small, fixed set of tools.
//!
//! This library provides:
//! - An HTTP API for task submission and polling
//! - A bounded orchestration loop between the model and the tools
//! - Sandboxed file tools, a read-only SQL tool, weather lookup and HTTP GET
//! - An OpenAI-compatible chat-completion client (Groq by default)
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a task via the API and queue it for a worker
//! 2. Build context with system prompt and available tools
//! 3. Call the model, execute any requested tool calls
//! 4. Feed results back to the model, repeat until it answers or the iteration cap is hit
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use task_agent::agent::{Agent, AgentSettings};
//! use task_agent::llm::OpenAiCompatibleClient;
//! use task_agent::task::Task;
//! use task_agent::tools::ToolRegistry;
//!
//! let llm = Arc::new(OpenAiCompatibleClient::new(api_key, task_agent::llm::DEFAULT_BASE_URL));
//! let agent = Agent::new(llm, Arc::new(ToolRegistry::new()), AgentSettings::default());
//! let task = Task::new("List the files in the sandbox").into_shared();
//! let status = agent.execute_task(&task).await;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod task;
pub mod tools;

pub use config::Config;
