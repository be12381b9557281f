//! Learning agent: folds engagement reports into per-user aggregates.
//! The aggregates are private to the instance; nothing else reads them
//! except through the task results it returns.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::bus::message::{AgentKind, TaskRequest};
use crate::error::Result;
use crate::runtime::{AgentHandler, Task};

use super::require_str;

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngagementSummary {
    pub samples: u64,
    pub total_score: f64,
    pub avg_score: f64,
    pub best_content_id: Option<String>,
    pub best_score: f64,
}

#[derive(Default)]
pub struct LearningAgent {
    aggregates: RwLock<HashMap<String, EngagementSummary>>,
}

impl LearningAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self, user_id: &str) -> Option<EngagementSummary> {
        self.aggregates.read().get(user_id).cloned()
    }
}

fn count(data: &serde_json::Value, field: &str) -> f64 {
    data.get(field).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

/// Shares and comments signal more than likes.
fn score(data: &serde_json::Value) -> f64 {
    count(data, "likes") + 2.0 * count(data, "comments") + 3.0 * count(data, "shares")
}

#[async_trait]
impl AgentHandler for LearningAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Learning
    }

    async fn validate_task(&self, request: &TaskRequest) -> Result<()> {
        require_str(&request.data, "content_id")?;
        Ok(())
    }

    async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
        let content_id = require_str(&task.payload, "content_id")?;
        let score = score(&task.payload);

        let summary = {
            let mut aggregates = self.aggregates.write();
            let entry = aggregates.entry(task.user_id.clone()).or_default();
            entry.samples += 1;
            entry.total_score += score;
            entry.avg_score = entry.total_score / entry.samples as f64;
            if score > entry.best_score || entry.best_content_id.is_none() {
                entry.best_score = score;
                entry.best_content_id = Some(content_id.to_string());
            }
            entry.clone()
        };

        debug!(user_id = %task.user_id, content_id, score, "Engagement folded in");
        Ok(serde_json::json!({
            "user_id": task.user_id,
            "content_id": content_id,
            "score": score,
            "summary": summary,
        }))
    }
}
