//! Agent runtime: the task lifecycle state machine shared by every worker.
//!
//! The runtime owns admission control, validation, execution bookkeeping,
//! result publication, periodic health reporting, and graceful drain.
//! Specialized agents implement [`AgentHandler`] on top of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::health::{HealthSnapshot, HealthSource, ResourceProbe};
use super::task::{Task, TaskError, TaskState};
use crate::bus::message::{
    AgentKind, AgentMessage, AgentStatus, MessagePayload, Priority, Target, TaskOutcome,
    TaskRequest,
};
use crate::bus::transport::{BusHandler, MessageBus};
use crate::config::{HealthConfig, RuntimeConfig};
use crate::error::Result;

/// The two callbacks every specialized agent must implement, plus
/// optional lifecycle and coordination hooks (default no-op).
#[async_trait]
pub trait AgentHandler: Send + Sync + 'static {
    fn kind(&self) -> AgentKind;

    /// Business predicate over the task payload; a failure rejects the
    /// request before any Task record exists.
    async fn validate_task(&self, request: &TaskRequest) -> Result<()>;

    async fn process_task(&self, task: &Task) -> Result<serde_json::Value>;

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn on_coordination(&self, _message: &AgentMessage) -> Result<()> {
        Ok(())
    }

    async fn on_status_update(&self, _message: &AgentMessage) -> Result<()> {
        Ok(())
    }
}

/// Instance-owned task counters.
#[derive(Default)]
pub struct TaskCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    total_duration_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct CountersSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub avg_duration_ms: u64,
}

impl TaskCounters {
    fn record_completed(&self, duration_ms: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total_ms = self.total_duration_ms.load(Ordering::Relaxed);
        CountersSnapshot {
            completed,
            failed,
            avg_duration_ms: if completed > 0 { total_ms / completed } else { 0 },
        }
    }
}

struct RuntimeInner<H: AgentHandler> {
    id: String,
    kind: AgentKind,
    config: RuntimeConfig,
    handler: H,
    bus: Arc<dyn MessageBus>,
    active: RwLock<HashMap<String, Task>>,
    counters: TaskCounters,
    running: AtomicBool,
    started_at: RwLock<Option<Instant>>,
    probe: Mutex<ResourceProbe>,
}

/// Bus-facing adapter so the subscription loop can call into the runtime.
struct Mailbox<H: AgentHandler>(Arc<RuntimeInner<H>>);

#[async_trait]
impl<H: AgentHandler> BusHandler for Mailbox<H> {
    async fn handle(&self, message: AgentMessage) -> Result<()> {
        self.0.dispatch(message).await
    }
}

pub struct AgentRuntime<H: AgentHandler> {
    inner: Arc<RuntimeInner<H>>,
    health_config: HealthConfig,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl<H: AgentHandler> AgentRuntime<H> {
    pub fn new(
        id: impl Into<String>,
        handler: H,
        bus: Arc<dyn MessageBus>,
        config: RuntimeConfig,
        health_config: HealthConfig,
    ) -> Self {
        let kind = handler.kind();
        Self {
            inner: Arc::new(RuntimeInner {
                id: id.into(),
                kind,
                config,
                handler,
                bus,
                active: RwLock::new(HashMap::new()),
                counters: TaskCounters::default(),
                running: AtomicBool::new(false),
                started_at: RwLock::new(None),
                probe: Mutex::new(ResourceProbe::new()),
            }),
            health_config,
            health_task: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> AgentKind {
        self.inner.kind
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.inner.counters.snapshot()
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.inner.compute_snapshot()
    }

    pub fn health_source(&self) -> Arc<dyn HealthSource> {
        Arc::clone(&self.inner) as Arc<dyn HealthSource>
    }

    /// Bring the agent online. Any failure here aborts startup and
    /// propagates; the agent never comes up half-initialized.
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        inner.bus.connect().await?;
        inner.bus.create_dead_letter_route(inner.kind).await?;
        inner.handler.initialize().await?;
        inner
            .bus
            .subscribe(inner.kind, Arc::new(Mailbox(Arc::clone(inner))))
            .await?;

        *inner.started_at.write() = Some(Instant::now());
        inner.running.store(true, Ordering::SeqCst);

        let reporter = Arc::clone(inner);
        let interval = Duration::from_secs(self.health_config.interval_secs);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                reporter.publish_health().await;
            }
        });
        *self.health_task.lock() = Some(handle);

        inner.publish_status(AgentStatus::Online).await?;
        info!(agent = %inner.id, kind = %inner.kind, "Agent online");
        Ok(())
    }

    /// Take the agent offline: stop admitting, cancel the health timer,
    /// drain in-flight tasks up to the drain timeout, then leave the bus.
    /// Errors along the way are logged; disconnection still happens.
    pub async fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        inner.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.health_task.lock().take() {
            handle.abort();
        }

        let deadline = Instant::now() + Duration::from_secs(inner.config.drain_timeout_secs);
        loop {
            let in_flight = inner.active.read().len();
            if in_flight == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    agent = %inner.id,
                    in_flight,
                    "Drain timeout elapsed, abandoning in-flight tasks"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(inner.config.drain_poll_millis)).await;
        }

        if let Err(e) = inner.handler.shutdown().await {
            warn!(agent = %inner.id, error = %e, "Handler shutdown hook failed");
        }
        if let Err(e) = inner.publish_status(AgentStatus::Offline).await {
            warn!(agent = %inner.id, error = %e, "Failed to broadcast offline status");
        }
        if let Err(e) = inner.bus.unsubscribe(inner.kind).await {
            warn!(agent = %inner.id, error = %e, "Failed to unsubscribe from the bus");
        }
        if let Err(e) = inner.bus.disconnect().await {
            warn!(agent = %inner.id, error = %e, "Bus disconnect failed");
        }
        info!(agent = %inner.id, "Agent offline");
        Ok(())
    }
}

impl<H: AgentHandler> RuntimeInner<H> {
    async fn dispatch(&self, message: AgentMessage) -> Result<()> {
        match &message.payload {
            MessagePayload::TaskRequest(request) => {
                self.handle_task_request(&message, request).await
            }
            MessagePayload::Coordination { .. } => self.handler.on_coordination(&message).await,
            MessagePayload::StatusUpdate { .. } => self.handler.on_status_update(&message).await,
            other => {
                warn!(
                    agent = %self.id,
                    kind = ?other.kind(),
                    msg_id = %message.id,
                    "Dropping unhandled message kind"
                );
                Ok(())
            }
        }
    }

    async fn handle_task_request(&self, message: &AgentMessage, request: &TaskRequest) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return self.reject(message, request, "agent is shutting down").await;
        }
        if self.active.read().len() >= self.config.max_concurrent_tasks {
            return self.reject(message, request, "at capacity").await;
        }
        if let Err(e) = self.handler.validate_task(request).await {
            return self
                .reject(message, request, &format!("invalid parameters: {}", e))
                .await;
        }

        let mut task = Task::from_request(self.kind, request);
        task.mark_in_progress();
        let task_id = task.id.clone();
        // Re-check under the write lock: admission bookkeeping is the only
        // serialized step. The guard must not survive into any await below.
        let admitted = {
            let mut active = self.active.write();
            if active.len() >= self.config.max_concurrent_tasks {
                false
            } else {
                active.insert(task_id.clone(), task);
                true
            }
        };
        if !admitted {
            return self.reject(message, request, "at capacity").await;
        }
        debug!(
            agent = %self.id,
            task_id = %task_id,
            task_type = %request.task_type,
            "Task admitted"
        );

        // Awaiting here keeps the delivery slot (and its prefetch permit)
        // occupied for the task's whole lifetime, so the transport bound
        // reinforces the admission bound.
        self.execute(task_id, message.source).await;
        Ok(())
    }

    async fn execute(&self, task_id: String, reply_to: AgentKind) {
        let task = match self.active.read().get(&task_id).cloned() {
            Some(task) => task,
            None => return,
        };

        let outcome = self.handler.process_task(&task).await;

        // Remove exactly once; the map entry is the single source of truth.
        let Some(mut task) = self.active.write().remove(&task_id) else {
            return;
        };

        match outcome {
            Ok(result) => {
                task.mark_completed(result);
                let duration = task.duration_ms().unwrap_or(0);
                self.counters.record_completed(duration);
                info!(agent = %self.id, task_id = %task.id, duration_ms = duration, "Task completed");
            }
            Err(e) => {
                task.mark_failed(TaskError::new(e.to_string()).with_stack(format!("{:?}", e)));
                self.counters.record_failed();
                warn!(agent = %self.id, task_id = %task.id, error = %e, "Task failed");
            }
        }

        let status = if task.state == TaskState::Completed {
            TaskOutcome::Completed
        } else {
            TaskOutcome::Failed
        };
        let payload = MessagePayload::TaskResult {
            task_id: task.id.clone(),
            user_id: task.user_id.clone(),
            status,
            result: task.result.clone(),
            error: task.error.clone(),
            duration_ms: task.duration_ms(),
        };
        let result_message = AgentMessage::new(self.kind, Target::Agent(reply_to), payload);
        if let Err(e) = self.bus.publish(result_message).await {
            error!(agent = %self.id, task_id = %task.id, error = %e, "Failed to publish task result");
        }
    }

    async fn reject(
        &self,
        message: &AgentMessage,
        request: &TaskRequest,
        reason: &str,
    ) -> Result<()> {
        warn!(agent = %self.id, msg_id = %message.id, reason, "Rejecting task request");
        let payload = MessagePayload::TaskResult {
            task_id: message.id.clone(),
            user_id: request.user_id.clone(),
            status: TaskOutcome::Rejected,
            result: None,
            error: Some(TaskError::new(reason)),
            duration_ms: None,
        };
        self.bus
            .publish(AgentMessage::new(
                self.kind,
                Target::Agent(message.source),
                payload,
            ))
            .await
    }

    fn compute_snapshot(&self) -> HealthSnapshot {
        let sample = self.probe.lock().sample();
        let active = self.active.read().len();
        let counters = self.counters.snapshot();
        let uptime_secs = self
            .started_at
            .read()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0);
        let running = self.running.load(Ordering::SeqCst);

        HealthSnapshot {
            healthy: running && active < self.config.max_concurrent_tasks,
            uptime_secs,
            last_check: Utc::now(),
            memory_ratio: sample.memory_ratio,
            cpu_percent: sample.cpu_percent,
            active_tasks: active,
            completed_tasks: counters.completed,
            failed_tasks: counters.failed,
            avg_duration_ms: counters.avg_duration_ms,
        }
    }

    async fn publish_health(&self) {
        let snapshot = self.compute_snapshot();
        let payload = MessagePayload::StatusUpdate {
            agent_id: self.id.clone(),
            status: AgentStatus::Health(snapshot),
        };
        let message = AgentMessage::broadcast(self.kind, payload).with_priority(Priority::Low);
        if let Err(e) = self.bus.publish(message).await {
            warn!(agent = %self.id, error = %e, "Failed to publish health snapshot");
        }
    }

    async fn publish_status(&self, status: AgentStatus) -> Result<()> {
        let payload = MessagePayload::StatusUpdate {
            agent_id: self.id.clone(),
            status,
        };
        self.bus
            .publish(AgentMessage::broadcast(self.kind, payload))
            .await
    }
}

impl<H: AgentHandler> HealthSource for RuntimeInner<H> {
    fn agent_id(&self) -> String {
        self.id.clone()
    }

    fn snapshot(&self) -> HealthSnapshot {
        self.compute_snapshot()
    }
}
