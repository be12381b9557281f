//! Agent runtime: task lifecycle, execution bookkeeping, and health.

pub mod agent;
pub mod health;
pub mod task;

pub use agent::{AgentHandler, AgentRuntime, CountersSnapshot, TaskCounters};
pub use health::{HealthSnapshot, HealthSource, ResourceProbe, ResourceSample};
pub use task::{Task, TaskError, TaskState};
