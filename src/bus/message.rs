//! Wire-level message envelope exchanged between agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runtime::health::HealthSnapshot;
use crate::runtime::task::TaskError;

/// The agent types the bus can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    ContentGenerator,
    QualityControl,
    Publisher,
    NewsMonitor,
    Learning,
    Orchestrator,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentGenerator => "content_generator",
            Self::QualityControl => "quality_control",
            Self::Publisher => "publisher",
            Self::NewsMonitor => "news_monitor",
            Self::Learning => "learning",
            Self::Orchestrator => "orchestrator",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery target: a specific agent type or every subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "agent", rename_all = "snake_case")]
pub enum Target {
    Agent(AgentKind),
    Broadcast,
}

impl Target {
    pub fn includes(&self, kind: AgentKind) -> bool {
        match self {
            Self::Agent(target) => *target == kind,
            Self::Broadcast => true,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }
}

/// Ordering hint for the broker/consumer; not a hard guarantee.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TaskRequest,
    TaskResult,
    Coordination,
    StatusUpdate,
    ErrorReport,
}

/// Payload of a task-request message; `data` stays opaque to the runtime
/// and is validated by the receiving agent before admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub user_id: String,
    pub task_type: String,
    pub data: serde_json::Value,
}

/// Final disposition of a task, carried in task-result messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Failed,
    Rejected,
}

/// Agent self-reported status carried in status-update messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Health(HealthSnapshot),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    TaskRequest(TaskRequest),
    TaskResult {
        /// Task id, or the originating message id for admission rejections
        /// (no Task record exists in that case).
        task_id: String,
        user_id: String,
        status: TaskOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<TaskError>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    Coordination {
        topic: String,
        data: serde_json::Value,
    },
    StatusUpdate {
        agent_id: String,
        status: AgentStatus,
    },
    ErrorReport {
        original_message_id: String,
        error: TaskError,
    },
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::TaskRequest(_) => MessageKind::TaskRequest,
            Self::TaskResult { .. } => MessageKind::TaskResult,
            Self::Coordination { .. } => MessageKind::Coordination,
            Self::StatusUpdate { .. } => MessageKind::StatusUpdate,
            Self::ErrorReport { .. } => MessageKind::ErrorReport,
        }
    }
}

/// Envelope for all inter-agent communication.
///
/// Every message has exactly one source and one target (or broadcast).
/// `timeout_ms` is a sender-side abandonment hint; the receiving runtime
/// does not enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: AgentKind,
    pub target: Target,
    pub priority: Priority,
    pub payload: MessagePayload,
    pub requires_ack: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl AgentMessage {
    pub fn new(source: AgentKind, target: Target, payload: MessagePayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source,
            target,
            priority: Priority::default(),
            payload,
            requires_ack: false,
            timeout_ms: None,
        }
    }

    pub fn broadcast(source: AgentKind, payload: MessagePayload) -> Self {
        Self::new(source, Target::Broadcast, payload)
    }

    pub fn task_request(source: AgentKind, target: AgentKind, request: TaskRequest) -> Self {
        Self::new(
            source,
            Target::Agent(target),
            MessagePayload::TaskRequest(request),
        )
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_ack(mut self) -> Self {
        self.requires_ack = true;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn is_for(&self, kind: AgentKind) -> bool {
        self.target.includes(kind)
    }
}
