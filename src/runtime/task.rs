//! Task lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::message::{AgentKind, TaskRequest};

/// Lifecycle state: Pending -> InProgress -> {Completed | Failed}.
/// Terminal states are final; retry is a new task created by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Error captured from a failed task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Unit of work owned by exactly one runtime instance for its lifetime.
/// The runtime never inspects `payload`; it only routes and holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub agent: AgentKind,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl Task {
    pub fn from_request(agent: AgentKind, request: &TaskRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            agent,
            task_type: request.task_type.clone(),
            payload: request.data.clone(),
            state: TaskState::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn mark_in_progress(&mut self) {
        self.state = TaskState::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, result: serde_json::Value) {
        self.state = TaskState::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
    }

    pub fn mark_failed(&mut self, error: TaskError) {
        self.state = TaskState::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Wall-clock duration, only defined once both timestamps exist.
    pub fn duration_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        let millis = (completed - started).num_milliseconds();
        Some(millis.max(0) as u64)
    }
}
