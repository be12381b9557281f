//! contentmesh: a multi-agent content orchestration core.
//!
//! Agents communicate over a message bus, each wrapped in a runtime that
//! owns admission control, task lifecycle, and health reporting. A
//! similarity engine guards against near-duplicate content before it is
//! published.

pub mod agents;
pub mod bus;
pub mod config;
pub mod contracts;
pub mod error;
pub mod runtime;
pub mod similarity;
pub mod surface;

pub use bus::{AgentKind, AgentMessage, InProcessBus, MessageBus, MessagePayload, Target};
pub use config::MeshConfig;
pub use error::{MeshError, Result};
pub use runtime::{AgentHandler, AgentRuntime, Task, TaskState};
pub use similarity::{PlagiarismReport, SimilarityEngine};
pub use surface::AgentRegistry;
