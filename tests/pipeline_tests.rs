//! Full pipeline over the bus: draft generation, quality review, and
//! publication, with the duplicate-content path exercised end to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use contentmesh::agents::{ContentGeneratorAgent, PublisherAgent, QualityControlAgent};
use contentmesh::bus::{
    AgentKind, AgentMessage, BusHandler, InProcessBus, MessageBus, MessagePayload, TaskOutcome,
    TaskRequest,
};
use contentmesh::config::{BusConfig, HealthConfig, RuntimeConfig, SimilarityConfig};
use contentmesh::contracts::{
    ContentStatus, ContentStore, InMemoryContentStore, InMemoryProfileStore, InMemoryPublishTarget,
    ProfileStore, PublishTarget,
};
use contentmesh::runtime::AgentRuntime;
use contentmesh::similarity::SimilarityEngine;
use contentmesh::Result;

struct ResultCollector {
    tx: mpsc::UnboundedSender<MessagePayload>,
}

#[async_trait]
impl BusHandler for ResultCollector {
    async fn handle(&self, message: AgentMessage) -> Result<()> {
        if matches!(message.payload, MessagePayload::TaskResult { .. }) {
            let _ = self.tx.send(message.payload);
        }
        Ok(())
    }
}

struct Pipeline {
    bus: Arc<dyn MessageBus>,
    contents: Arc<InMemoryContentStore>,
    generator: AgentRuntime<ContentGeneratorAgent>,
    quality: AgentRuntime<QualityControlAgent>,
    publisher: AgentRuntime<PublisherAgent>,
    results: mpsc::UnboundedReceiver<MessagePayload>,
}

async fn pipeline() -> Pipeline {
    let bus: Arc<dyn MessageBus> = Arc::new(InProcessBus::new(BusConfig::default()));
    let profiles: Arc<dyn ProfileStore> = Arc::new(InMemoryProfileStore::new());
    let contents = Arc::new(InMemoryContentStore::new());
    let target: Arc<dyn PublishTarget> = Arc::new(InMemoryPublishTarget::new());
    let engine = Arc::new(SimilarityEngine::new(SimilarityConfig::default()));

    let runtime_config = RuntimeConfig {
        max_concurrent_tasks: 4,
        drain_timeout_secs: 2,
        drain_poll_millis: 20,
    };
    let health_config = HealthConfig { interval_secs: 60 };

    let generator = AgentRuntime::new(
        "content-generator-1",
        ContentGeneratorAgent::new(
            profiles,
            Arc::clone(&contents) as Arc<dyn ContentStore>,
        ),
        Arc::clone(&bus),
        runtime_config.clone(),
        health_config.clone(),
    );
    let quality = AgentRuntime::new(
        "quality-control-1",
        QualityControlAgent::new(engine, Arc::clone(&contents) as Arc<dyn ContentStore>),
        Arc::clone(&bus),
        runtime_config.clone(),
        health_config.clone(),
    );
    let publisher = AgentRuntime::new(
        "publisher-1",
        PublisherAgent::new(Arc::clone(&contents) as Arc<dyn ContentStore>, target),
        Arc::clone(&bus),
        runtime_config,
        health_config,
    );

    generator.start().await.unwrap();
    quality.start().await.unwrap();
    publisher.start().await.unwrap();

    let (tx, results) = mpsc::unbounded_channel();
    bus.connect().await.unwrap();
    bus.subscribe(AgentKind::Orchestrator, Arc::new(ResultCollector { tx }))
        .await
        .unwrap();

    Pipeline {
        bus,
        contents,
        generator,
        quality,
        publisher,
        results,
    }
}

impl Pipeline {
    async fn submit(
        &mut self,
        agent: AgentKind,
        task_type: &str,
        data: serde_json::Value,
    ) -> (TaskOutcome, Option<serde_json::Value>) {
        self.bus
            .publish(AgentMessage::task_request(
                AgentKind::Orchestrator,
                agent,
                TaskRequest {
                    user_id: "user-1".into(),
                    task_type: task_type.into(),
                    data,
                },
            ))
            .await
            .unwrap();

        let payload = timeout(Duration::from_secs(2), self.results.recv())
            .await
            .expect("timed out waiting for a task result")
            .expect("result channel closed");
        let MessagePayload::TaskResult { status, result, .. } = payload else {
            panic!("expected a task result");
        };
        (status, result)
    }

    async fn shutdown(self) {
        self.publisher.stop().await.unwrap();
        self.quality.stop().await.unwrap();
        self.generator.stop().await.unwrap();
    }
}

#[tokio::test]
async fn clean_content_flows_from_draft_to_published() {
    let mut p = pipeline().await;

    let (status, result) = p
        .submit(
            AgentKind::ContentGenerator,
            "generate",
            serde_json::json!({"topic": "rust memory safety"}),
        )
        .await;
    assert_eq!(status, TaskOutcome::Completed);
    let content_id = result.unwrap()["content_id"].as_str().unwrap().to_string();

    let record = p.contents.get(&content_id).await.unwrap().unwrap();
    assert_eq!(record.status, ContentStatus::Draft);

    let (status, result) = p
        .submit(
            AgentKind::QualityControl,
            "review",
            serde_json::json!({"content_id": content_id, "text": record.body}),
        )
        .await;
    assert_eq!(status, TaskOutcome::Completed);
    assert_eq!(result.unwrap()["approved"], true);

    let (status, result) = p
        .submit(
            AgentKind::Publisher,
            "publish",
            serde_json::json!({"content_id": content_id}),
        )
        .await;
    assert_eq!(status, TaskOutcome::Completed);
    assert_eq!(result.unwrap()["post_id"], "post-1");

    let record = p.contents.get(&content_id).await.unwrap().unwrap();
    assert_eq!(record.status, ContentStatus::Published);
    assert_eq!(record.post_id.as_deref(), Some("post-1"));

    p.shutdown().await;
}

#[tokio::test]
async fn duplicate_content_is_rejected_and_never_published() {
    let mut p = pipeline().await;

    let mut content_ids = vec![];
    for _ in 0..2 {
        let (status, result) = p
            .submit(
                AgentKind::ContentGenerator,
                "generate",
                serde_json::json!({"topic": "rust memory safety"}),
            )
            .await;
        assert_eq!(status, TaskOutcome::Completed);
        content_ids.push(result.unwrap()["content_id"].as_str().unwrap().to_string());
    }

    for (i, content_id) in content_ids.iter().enumerate() {
        let record = p.contents.get(content_id).await.unwrap().unwrap();
        let (status, result) = p
            .submit(
                AgentKind::QualityControl,
                "review",
                serde_json::json!({"content_id": content_id, "text": record.body}),
            )
            .await;
        assert_eq!(status, TaskOutcome::Completed);
        // Identical bodies: the first passes, the second is caught.
        assert_eq!(result.unwrap()["approved"], i == 0);
    }

    let copy_id = &content_ids[1];
    let record = p.contents.get(copy_id).await.unwrap().unwrap();
    assert_eq!(record.status, ContentStatus::Rejected);

    let (status, _) = p
        .submit(
            AgentKind::Publisher,
            "publish",
            serde_json::json!({"content_id": copy_id}),
        )
        .await;
    assert_eq!(status, TaskOutcome::Failed);
    let record = p.contents.get(copy_id).await.unwrap().unwrap();
    assert!(record.post_id.is_none());

    p.shutdown().await;
}
