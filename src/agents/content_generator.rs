//! Draft generation agent: turns a topic into a stored draft record,
//! personalized by the user's profile when one exists.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::bus::message::{AgentKind, TaskRequest};
use crate::contracts::{ContentRecord, ContentStore, ProfileStore};
use crate::error::Result;
use crate::runtime::{AgentHandler, Task};

use super::{optional_str, require_str};

pub struct ContentGeneratorAgent {
    profiles: Arc<dyn ProfileStore>,
    contents: Arc<dyn ContentStore>,
}

impl ContentGeneratorAgent {
    pub fn new(profiles: Arc<dyn ProfileStore>, contents: Arc<dyn ContentStore>) -> Self {
        Self { profiles, contents }
    }

    fn compose(&self, topic: &str, content_type: &str, tone: &str, interests: &[String]) -> String {
        let mut body = format!(
            "Here is a {tone} take on {topic}. \
             This {content_type} walks through what changed, why it matters, \
             and what to watch next."
        );
        if !interests.is_empty() {
            body.push_str(&format!(
                " Related areas worth a look: {}.",
                interests.join(", ")
            ));
        }
        body
    }
}

#[async_trait]
impl AgentHandler for ContentGeneratorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ContentGenerator
    }

    async fn validate_task(&self, request: &TaskRequest) -> Result<()> {
        require_str(&request.data, "topic")?;
        Ok(())
    }

    async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
        let topic = require_str(&task.payload, "topic")?;
        let content_type = optional_str(&task.payload, "content_type", "post");

        let profile = self.profiles.get(&task.user_id).await?;
        let (tone, interests): (&str, &[String]) = match &profile {
            Some(p) => (p.tone.as_str(), p.interests.as_slice()),
            None => ("neutral", &[]),
        };

        let body = self.compose(topic, content_type, tone, interests);
        let record = ContentRecord::draft(&task.user_id, content_type, topic, body);
        let content_id = record.id.clone();
        let word_count = record.body.split_whitespace().count();
        self.contents.create(record).await?;

        debug!(content_id = %content_id, topic, "Draft created");
        Ok(serde_json::json!({
            "content_id": content_id,
            "topic": topic,
            "content_type": content_type,
            "word_count": word_count,
            "personalized": profile.is_some(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ContentStatus, InMemoryContentStore, InMemoryProfileStore, UserProfile};
    use crate::error::MeshError;

    fn agent() -> (ContentGeneratorAgent, Arc<InMemoryContentStore>) {
        let profiles = Arc::new(InMemoryProfileStore::new());
        profiles.insert(UserProfile {
            user_id: "user-1".into(),
            display_name: "Ada".into(),
            tone: "playful".into(),
            interests: vec!["compilers".into(), "embedded".into()],
        });
        let contents = Arc::new(InMemoryContentStore::new());
        (
            ContentGeneratorAgent::new(profiles, Arc::clone(&contents) as Arc<dyn ContentStore>),
            contents,
        )
    }

    fn task(data: serde_json::Value) -> Task {
        Task::from_request(
            AgentKind::ContentGenerator,
            &TaskRequest {
                user_id: "user-1".into(),
                task_type: "generate".into(),
                data,
            },
        )
    }

    #[tokio::test]
    async fn test_rejects_missing_topic() {
        let (agent, _) = agent();
        let err = agent
            .validate_task(&TaskRequest {
                user_id: "user-1".into(),
                task_type: "generate".into(),
                data: serde_json::json!({"topic": "   "}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Validation(_)));
    }

    #[tokio::test]
    async fn test_creates_personalized_draft() {
        let (agent, contents) = agent();
        let result = agent
            .process_task(&task(serde_json::json!({"topic": "borrow checker"})))
            .await
            .unwrap();

        assert_eq!(result["personalized"], true);
        let content_id = result["content_id"].as_str().unwrap();
        let record = contents.get(content_id).await.unwrap().unwrap();
        assert_eq!(record.status, ContentStatus::Draft);
        assert!(record.body.contains("playful"));
        assert!(record.body.contains("compilers"));
    }

    #[tokio::test]
    async fn test_unknown_user_gets_neutral_draft() {
        let (agent, contents) = agent();
        let mut t = task(serde_json::json!({"topic": "async runtimes", "content_type": "thread"}));
        t.user_id = "stranger".into();

        let result = agent.process_task(&t).await.unwrap();
        assert_eq!(result["personalized"], false);
        assert_eq!(result["content_type"], "thread");
        assert_eq!(contents.len(), 1);
    }
}
