//! Process-level health and metrics surface.

pub mod http;
pub mod registry;

pub use registry::{AgentMetrics, AgentRegistry, MetricsReport};
