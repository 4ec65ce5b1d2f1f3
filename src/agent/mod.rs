//! Agent module - the orchestration loop that runs a task.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and user task
//! 2. Call the model with every registered tool available
//! 3. If the model requests tool calls, execute them and feed each result back
//! 4. Repeat until the model answers without tool calls or the iteration cap is hit

mod agent_loop;
mod prompt;

pub use agent_loop::{Agent, AgentSettings};
pub use prompt::build_system_prompt;
