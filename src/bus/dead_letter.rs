//! Bounded store for messages that exhausted their delivery retries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::message::AgentMessage;

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: AgentMessage,
    pub error: String,
    pub attempts: u32,
    pub dead_lettered_at: DateTime<Utc>,
}

/// In-memory dead-letter queue with oldest-first eviction.
pub struct DeadLetterQueue {
    entries: RwLock<VecDeque<DeadLetter>>,
    capacity: usize,
    total_routed: AtomicU64,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity,
            total_routed: AtomicU64::new(0),
        }
    }

    pub fn push(&self, message: AgentMessage, error: String, attempts: u32) {
        self.total_routed.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(DeadLetter {
            message,
            error,
            attempts,
            dead_lettered_at: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Total messages ever routed here, including evicted ones.
    pub fn total_routed(&self) -> u64 {
        self.total_routed.load(Ordering::Relaxed)
    }

    pub fn drain(&self) -> Vec<DeadLetter> {
        self.entries.write().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::message::{AgentKind, MessagePayload, TaskRequest};

    fn sample_message() -> AgentMessage {
        AgentMessage::task_request(
            AgentKind::Orchestrator,
            AgentKind::Publisher,
            TaskRequest {
                user_id: "u".into(),
                task_type: "publish".into(),
                data: serde_json::Value::Null,
            },
        )
    }

    #[test]
    fn test_push_and_drain() {
        let queue = DeadLetterQueue::new(10);
        queue.push(sample_message(), "handler failed".into(), 3);

        assert_eq!(queue.len(), 1);
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].attempts, 3);
        assert!(queue.is_empty());
        assert_eq!(queue.total_routed(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let queue = DeadLetterQueue::new(2);
        for i in 0..3 {
            queue.push(sample_message(), format!("err-{}", i), 1);
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.total_routed(), 3);
        let drained = queue.drain();
        assert_eq!(drained[0].error, "err-1");
        assert_eq!(drained[1].error, "err-2");
    }

    #[test]
    fn test_payload_kind_preserved() {
        let queue = DeadLetterQueue::new(4);
        queue.push(sample_message(), "boom".into(), 1);
        let drained = queue.drain();
        assert!(matches!(
            drained[0].message.payload,
            MessagePayload::TaskRequest(_)
        ));
    }
}
