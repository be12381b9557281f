//! Publisher agent: pushes approved content to the external platform
//! and records the returned post id.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::bus::message::{AgentKind, TaskRequest};
use crate::contracts::{ContentStatus, ContentStore, PublishTarget};
use crate::error::{MeshError, Result};
use crate::runtime::{AgentHandler, Task};

use super::require_str;

pub struct PublisherAgent {
    contents: Arc<dyn ContentStore>,
    target: Arc<dyn PublishTarget>,
}

impl PublisherAgent {
    pub fn new(contents: Arc<dyn ContentStore>, target: Arc<dyn PublishTarget>) -> Self {
        Self { contents, target }
    }
}

#[async_trait]
impl AgentHandler for PublisherAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Publisher
    }

    async fn validate_task(&self, request: &TaskRequest) -> Result<()> {
        require_str(&request.data, "content_id")?;
        Ok(())
    }

    async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
        let content_id = require_str(&task.payload, "content_id")?;

        let record = self
            .contents
            .get(content_id)
            .await?
            .ok_or_else(|| MeshError::ContentNotFound(content_id.to_string()))?;
        if record.status != ContentStatus::Approved {
            return Err(MeshError::Publish(format!(
                "content {content_id} is not approved"
            )));
        }

        let post_id = self.target.publish(&record).await?;
        self.contents.set_post_id(content_id, &post_id).await?;
        self.contents
            .set_status(content_id, ContentStatus::Published)
            .await?;

        info!(content_id, post_id = %post_id, "Content published");
        Ok(serde_json::json!({
            "content_id": content_id,
            "post_id": post_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ContentRecord, InMemoryContentStore, InMemoryPublishTarget};

    async fn setup(
        status: ContentStatus,
    ) -> (PublisherAgent, Arc<InMemoryContentStore>, Arc<InMemoryPublishTarget>, String) {
        let contents = Arc::new(InMemoryContentStore::new());
        let target = Arc::new(InMemoryPublishTarget::new());
        let mut record = ContentRecord::draft("user-1", "post", "rust", "Body text.");
        record.status = status;
        let id = record.id.clone();
        contents.create(record).await.unwrap();
        let agent = PublisherAgent::new(
            Arc::clone(&contents) as Arc<dyn ContentStore>,
            Arc::clone(&target) as Arc<dyn PublishTarget>,
        );
        (agent, contents, target, id)
    }

    fn task(content_id: &str) -> Task {
        Task::from_request(
            AgentKind::Publisher,
            &TaskRequest {
                user_id: "user-1".into(),
                task_type: "publish".into(),
                data: serde_json::json!({"content_id": content_id}),
            },
        )
    }

    #[tokio::test]
    async fn test_publishes_approved_content() {
        let (agent, contents, target, id) = setup(ContentStatus::Approved).await;
        let result = agent.process_task(&task(&id)).await.unwrap();

        assert_eq!(result["post_id"], "post-1");
        let record = contents.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, ContentStatus::Published);
        assert_eq!(record.post_id.as_deref(), Some("post-1"));
        assert_eq!(target.published_ids(), vec![id]);
    }

    #[tokio::test]
    async fn test_refuses_unapproved_content() {
        let (agent, _, target, id) = setup(ContentStatus::Draft).await;
        let err = agent.process_task(&task(&id)).await.unwrap_err();

        assert!(matches!(err, MeshError::Publish(_)));
        assert!(target.published_ids().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_content_fails() {
        let (agent, _, _, _) = setup(ContentStatus::Approved).await;
        let err = agent.process_task(&task("ghost")).await.unwrap_err();
        assert!(matches!(err, MeshError::ContentNotFound(_)));
    }
}
