//! Specialized agent handlers built on top of the runtime.

pub mod content_generator;
pub mod learning;
pub mod news_monitor;
pub mod publisher;
pub mod quality_control;

pub use content_generator::ContentGeneratorAgent;
pub use learning::LearningAgent;
pub use news_monitor::NewsMonitorAgent;
pub use publisher::PublisherAgent;
pub use quality_control::QualityControlAgent;

use crate::error::{MeshError, Result};

/// Required non-empty string field of a task payload.
pub(crate) fn require_str<'a>(data: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    data.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MeshError::Validation(format!("missing or empty field: {field}")))
}

/// Optional string field, trimmed; absent or empty yields the default.
pub(crate) fn optional_str<'a>(
    data: &'a serde_json::Value,
    field: &str,
    default: &'a str,
) -> &'a str {
    data.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}
