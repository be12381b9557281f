//! Narrow interfaces to external collaborators. The agents only ever see
//! these traits; the in-memory implementations back the binary and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MeshError, Result};

/// Read-only view of a user profile used to personalize drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub tone: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Approved,
    Rejected,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub user_id: String,
    pub content_type: String,
    pub topic: String,
    pub body: String,
    pub status: ContentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    pub fn draft(
        user_id: impl Into<String>,
        content_type: impl Into<String>,
        topic: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            content_type: content_type.into(),
            topic: topic.into(),
            body: body.into(),
            status: ContentStatus::Draft,
            post_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

/// Content records only move forward through status transitions;
/// nothing here deletes.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create(&self, record: ContentRecord) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<ContentRecord>>;
    async fn set_status(&self, id: &str, status: ContentStatus) -> Result<()>;
    async fn set_post_id(&self, id: &str, post_id: &str) -> Result<()>;
}

#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Pushes the content to the platform and returns its post id.
    async fn publish(&self, record: &ContentRecord) -> Result<String>;
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) {
        self.profiles
            .write()
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().get(user_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryContentStore {
    records: RwLock<HashMap<String, ContentRecord>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn create(&self, record: ContentRecord) -> Result<()> {
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ContentRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn set_status(&self, id: &str, status: ContentStatus) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| MeshError::ContentNotFound(id.to_string()))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn set_post_id(&self, id: &str, post_id: &str) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| MeshError::ContentNotFound(id.to_string()))?;
        record.post_id = Some(post_id.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }
}

/// Records every publish call; post ids are sequential for easy asserts.
#[derive(Default)]
pub struct InMemoryPublishTarget {
    sequence: AtomicU64,
    published: RwLock<Vec<String>>,
}

impl InMemoryPublishTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_ids(&self) -> Vec<String> {
        self.published.read().clone()
    }
}

#[async_trait]
impl PublishTarget for InMemoryPublishTarget {
    async fn publish(&self, record: &ContentRecord) -> Result<String> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let post_id = format!("post-{n}");
        self.published.write().push(record.id.clone());
        Ok(post_id)
    }
}
