//! Quality control agent: runs the similarity engine over submitted text
//! and moves the content record to approved or rejected.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::bus::message::{AgentKind, TaskRequest};
use crate::contracts::{ContentStatus, ContentStore};
use crate::error::Result;
use crate::runtime::{AgentHandler, Task};
use crate::similarity::SimilarityEngine;

use super::require_str;

pub struct QualityControlAgent {
    engine: Arc<SimilarityEngine>,
    contents: Arc<dyn ContentStore>,
}

impl QualityControlAgent {
    pub fn new(engine: Arc<SimilarityEngine>, contents: Arc<dyn ContentStore>) -> Self {
        Self { engine, contents }
    }
}

#[async_trait]
impl AgentHandler for QualityControlAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::QualityControl
    }

    async fn validate_task(&self, request: &TaskRequest) -> Result<()> {
        require_str(&request.data, "content_id")?;
        require_str(&request.data, "text")?;
        Ok(())
    }

    async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
        let content_id = require_str(&task.payload, "content_id")?;
        let text = require_str(&task.payload, "text")?;

        let report = self.engine.check(content_id, text);
        let status = if report.is_plagiarized {
            ContentStatus::Rejected
        } else {
            ContentStatus::Approved
        };
        self.contents.set_status(content_id, status).await?;

        info!(
            content_id,
            approved = !report.is_plagiarized,
            max_similarity = report.max_similarity,
            "Quality verdict recorded"
        );
        Ok(serde_json::json!({
            "content_id": content_id,
            "approved": !report.is_plagiarized,
            "max_similarity": report.max_similarity,
            "content_hash": report.content_hash,
            "matches": report.matches,
        }))
    }
}
