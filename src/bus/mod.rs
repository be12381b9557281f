//! Message bus abstraction: envelope types, transport trait, and the
//! in-process reference implementation.

pub mod dead_letter;
pub mod message;
pub mod transport;

pub use dead_letter::{DeadLetter, DeadLetterQueue};
pub use message::{
    AgentKind, AgentMessage, AgentStatus, MessageKind, MessagePayload, Priority, Target,
    TaskOutcome, TaskRequest,
};
pub use transport::{BusHandler, BusStatsSnapshot, InProcessBus, MessageBus};
