//! Task records and their execution log.
//!
//! A [`Task`] moves strictly forward through its lifecycle:
//! `pending → running → {completed | failed}`. Transition methods enforce
//! this and keep the `result`/`error` pair consistent, so callers cannot
//! produce a completed task without a result or a failed task without an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A task shared between the store (for polling) and the agent (for mutation).
pub type SharedTask = Arc<RwLock<Task>>;

/// Task status enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is queued, waiting to start
    Pending,
    /// Task is currently running
    Running,
    /// Task completed successfully
    Completed,
    /// Task failed with an error
    Failed,
}

impl TaskStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid task transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Kinds of execution steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Reserved for model reasoning; not emitted yet
    Thinking,
    /// A tool is being called
    ToolCall,
    /// A tool returned a result (or failed)
    ToolResult,
    /// The final answer, or the error that ended the task
    Final,
}

/// A single entry in the task execution log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "type")]
    pub kind: StepKind,

    /// Human-readable summary
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Arguments as submitted by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,

    /// Result or error payload as returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<Value>,
}

impl ExecutionStep {
    pub fn tool_call(tool_name: &str, input: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: StepKind::ToolCall,
            content: format!("Calling {}", tool_name),
            tool_name: Some(tool_name.to_string()),
            tool_input: Some(input),
            tool_output: None,
        }
    }

    pub fn tool_result(tool_name: &str, content: impl Into<String>, output: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: StepKind::ToolResult,
            content: content.into(),
            tool_name: Some(tool_name.to_string()),
            tool_input: None,
            tool_output: Some(output),
        }
    }

    pub fn final_answer(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: StepKind::Final,
            content: content.into(),
            tool_name: None,
            tool_input: None,
            tool_output: None,
        }
    }
}

/// One end-to-end request from prompt to terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: String,
    prompt: String,
    status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    steps: Vec<ExecutionStep>,
    /// Number of model round-trips performed so far
    #[serde(default)]
    iterations: usize,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with a fresh identifier.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            steps: Vec::new(),
            iterations: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Wrap this task for sharing between the store and a worker.
    pub fn into_shared(self) -> SharedTask {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// `pending → running`.
    pub fn mark_running(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Pending, TaskStatus::Running)
    }

    /// `running → completed`, recording the final answer.
    pub fn complete(&mut self, result: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running, TaskStatus::Completed)?;
        self.result = Some(result.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `running → failed`, recording the error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running, TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Append a step to the log. Steps are never modified after this.
    pub fn push_step(&mut self, step: ExecutionStep) {
        self.steps.push(step);
    }

    pub(crate) fn record_iteration(&mut self) -> usize {
        self.iterations += 1;
        self.iterations
    }

    fn transition(&mut self, from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        if self.status != from {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
