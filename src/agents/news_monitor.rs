//! News monitor agent: scans a feed for items matching the requested
//! topics and emits each discovery as a coordination message so the
//! content generator can pick it up.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus::message::{AgentKind, AgentMessage, MessagePayload, Target, TaskRequest};
use crate::bus::transport::MessageBus;
use crate::error::{MeshError, Result};
use crate::runtime::{AgentHandler, Task};

pub const DISCOVERY_TOPIC: &str = "news.discovered";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub url: String,
    pub summary: String,
}

/// Source of current news items; the real one wraps an external API.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn latest(&self) -> Result<Vec<NewsItem>>;
}

/// Fixed in-memory feed used by the binary default and by tests.
#[derive(Default)]
pub struct StaticNewsFeed {
    items: RwLock<Vec<NewsItem>>,
}

impl StaticNewsFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: NewsItem) {
        self.items.write().push(item);
    }
}

#[async_trait]
impl NewsFeed for StaticNewsFeed {
    async fn latest(&self) -> Result<Vec<NewsItem>> {
        Ok(self.items.read().clone())
    }
}

pub struct NewsMonitorAgent {
    feed: Arc<dyn NewsFeed>,
    bus: Arc<dyn MessageBus>,
}

impl NewsMonitorAgent {
    pub fn new(feed: Arc<dyn NewsFeed>, bus: Arc<dyn MessageBus>) -> Self {
        Self { feed, bus }
    }
}

fn topics_of(data: &serde_json::Value) -> Result<Vec<String>> {
    let topics: Vec<String> = data
        .get("topics")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default();
    if topics.is_empty() {
        return Err(MeshError::Validation(
            "topics must be a non-empty list of keywords".into(),
        ));
    }
    Ok(topics)
}

fn matched_topic<'a>(item: &NewsItem, topics: &'a [String]) -> Option<&'a str> {
    let haystack = format!("{} {}", item.headline, item.summary).to_lowercase();
    topics
        .iter()
        .find(|topic| haystack.contains(topic.as_str()))
        .map(String::as_str)
}

#[async_trait]
impl AgentHandler for NewsMonitorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::NewsMonitor
    }

    async fn validate_task(&self, request: &TaskRequest) -> Result<()> {
        topics_of(&request.data)?;
        Ok(())
    }

    async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
        let topics = topics_of(&task.payload)?;
        let items = self.feed.latest().await?;
        let scanned = items.len();

        let mut discovered = 0usize;
        for item in items {
            let Some(topic) = matched_topic(&item, &topics) else {
                continue;
            };
            let message = AgentMessage::new(
                AgentKind::NewsMonitor,
                Target::Agent(AgentKind::ContentGenerator),
                MessagePayload::Coordination {
                    topic: DISCOVERY_TOPIC.into(),
                    data: serde_json::json!({
                        "user_id": task.user_id,
                        "matched_topic": topic,
                        "item": item,
                    }),
                },
            );
            self.bus.publish(message).await?;
            discovered += 1;
        }

        debug!(scanned, discovered, "Feed scan finished");
        Ok(serde_json::json!({
            "scanned": scanned,
            "discovered": discovered,
            "topics": topics,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InProcessBus;
    use crate::config::BusConfig;

    fn feed() -> Arc<StaticNewsFeed> {
        let feed = Arc::new(StaticNewsFeed::new());
        feed.push(NewsItem {
            headline: "Rust 2.0 rumors swirl".into(),
            url: "https://example.com/rust".into(),
            summary: "Speculation about the language roadmap.".into(),
        });
        feed.push(NewsItem {
            headline: "Sourdough enthusiasts gather".into(),
            url: "https://example.com/bread".into(),
            summary: "Baking is having a moment.".into(),
        });
        feed
    }

    fn task(data: serde_json::Value) -> Task {
        Task::from_request(
            AgentKind::NewsMonitor,
            &TaskRequest {
                user_id: "user-1".into(),
                task_type: "scan".into(),
                data,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_topics_fail_validation() {
        let bus = Arc::new(InProcessBus::new(BusConfig::default()));
        let agent = NewsMonitorAgent::new(feed(), bus);
        let err = agent
            .validate_task(&TaskRequest {
                user_id: "user-1".into(),
                task_type: "scan".into(),
                data: serde_json::json!({"topics": []}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Validation(_)));
    }

    #[tokio::test]
    async fn test_matching_items_are_emitted() {
        let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new(BusConfig::default()));
        bus.connect().await.unwrap();
        let agent = NewsMonitorAgent::new(feed(), Arc::clone(&bus) as Arc<dyn MessageBus>);

        let result = agent
            .process_task(&task(serde_json::json!({"topics": ["rust", "wasm"]})))
            .await
            .unwrap();

        assert_eq!(result["scanned"], 2);
        assert_eq!(result["discovered"], 1);
    }

    #[tokio::test]
    async fn test_no_match_publishes_nothing() {
        let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new(BusConfig::default()));
        bus.connect().await.unwrap();
        let agent = NewsMonitorAgent::new(feed(), Arc::clone(&bus) as Arc<dyn MessageBus>);

        let result = agent
            .process_task(&task(serde_json::json!({"topics": ["football"]})))
            .await
            .unwrap();
        assert_eq!(result["discovered"], 0);
    }
}
