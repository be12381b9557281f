//! Transport abstraction over a topic-based broker, plus the in-process
//! reference implementation used by tests and single-node deployments.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dead_letter::DeadLetterQueue;
use super::message::{AgentKind, AgentMessage, MessagePayload, Target};
use crate::config::BusConfig;
use crate::error::{MeshError, Result};
use crate::runtime::task::TaskError;

/// Receives messages delivered by a subscription.
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn handle(&self, message: AgentMessage) -> Result<()>;
}

/// Broker-facing contract: connection, publish, subscribe-with-handler,
/// and dead-letter routing. Implementations hide acknowledgment and
/// reconnection mechanics from callers.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn publish(&self, message: AgentMessage) -> Result<()>;
    /// Registers the single handler for an agent kind. Delivery is bounded
    /// by the configured prefetch count.
    async fn subscribe(&self, kind: AgentKind, handler: Arc<dyn BusHandler>) -> Result<()>;
    async fn unsubscribe(&self, kind: AgentKind) -> Result<()>;
    async fn create_dead_letter_route(&self, kind: AgentKind) -> Result<()>;
}

#[derive(Default)]
pub struct BusStats {
    published: AtomicU64,
    backpressure_events: AtomicU64,
    handler_failures: AtomicU64,
    reconnects: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct BusStatsSnapshot {
    pub published: u64,
    pub backpressure_events: u64,
    pub handler_failures: u64,
    pub reconnects: u64,
}

impl BusStats {
    pub fn snapshot(&self) -> BusStatsSnapshot {
        BusStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

struct Subscription {
    handler: Arc<dyn BusHandler>,
    task: JoinHandle<()>,
}

/// In-process bus over a tokio broadcast channel.
///
/// Connections are refcounted: each agent runtime holds one logical
/// connection. When the count drops to zero, delivery loops stop; a later
/// publish triggers bounded reconnection with fixed backoff, after which
/// existing subscriptions are re-established transparently.
pub struct InProcessBus {
    sender: broadcast::Sender<AgentMessage>,
    config: BusConfig,
    connections: AtomicUsize,
    subscriptions: Mutex<HashMap<AgentKind, Subscription>>,
    dead_letter_routes: Arc<Mutex<HashSet<AgentKind>>>,
    dead_letters: Arc<DeadLetterQueue>,
    stats: Arc<BusStats>,
}

impl InProcessBus {
    pub fn new(config: BusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        let dead_letters = Arc::new(DeadLetterQueue::new(config.dead_letter_capacity));
        Self {
            sender,
            config,
            connections: AtomicUsize::new(0),
            subscriptions: Mutex::new(HashMap::new()),
            dead_letter_routes: Arc::new(Mutex::new(HashSet::new())),
            dead_letters,
            stats: Arc::new(BusStats::default()),
        }
    }

    pub fn dead_letters(&self) -> Arc<DeadLetterQueue> {
        Arc::clone(&self.dead_letters)
    }

    pub fn stats(&self) -> BusStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn spawn_delivery(&self, kind: AgentKind, handler: Arc<dyn BusHandler>) -> JoinHandle<()> {
        let mut receiver = self.sender.subscribe();
        let prefetch = Arc::new(Semaphore::new(self.config.prefetch_count));
        let max_attempts = self.config.handler_retries + 1;
        let dead_letters = Arc::clone(&self.dead_letters);
        let routes = Arc::clone(&self.dead_letter_routes);
        let sender = self.sender.clone();
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            loop {
                let message = match receiver.recv().await {
                    Ok(msg) if msg.is_for(kind) => msg,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(agent = %kind, skipped = n, "Subscription lagged behind the channel");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                // Prefetch exhaustion is the bus-level backpressure signal;
                // the runtime's admission check is the second layer.
                let permit = match prefetch.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                        warn!(agent = %kind, "Prefetch exhausted, waiting for in-flight deliveries");
                        match prefetch.clone().acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => break,
                        }
                    }
                };

                let handler = Arc::clone(&handler);
                let dead_letters = Arc::clone(&dead_letters);
                let routes = Arc::clone(&routes);
                let sender = sender.clone();
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    let mut attempts = 0u32;
                    loop {
                        attempts += 1;
                        match handler.handle(message.clone()).await {
                            Ok(()) => break,
                            Err(e) if attempts >= max_attempts => {
                                stats.handler_failures.fetch_add(1, Ordering::Relaxed);
                                warn!(
                                    agent = %kind,
                                    msg_id = %message.id,
                                    attempts,
                                    error = %e,
                                    "Handler exhausted retries, routing to dead letters"
                                );
                                // An established route reports the failure back
                                // to the sender as well.
                                if routes.lock().contains(&kind) {
                                    let report = AgentMessage::new(
                                        kind,
                                        Target::Agent(message.source),
                                        MessagePayload::ErrorReport {
                                            original_message_id: message.id.clone(),
                                            error: TaskError::new(e.to_string()),
                                        },
                                    );
                                    let _ = sender.send(report);
                                }
                                dead_letters.push(message, e.to_string(), attempts);
                                break;
                            }
                            Err(e) => {
                                debug!(agent = %kind, msg_id = %message.id, attempts, error = %e, "Handler failed, retrying");
                            }
                        }
                    }
                    drop(permit);
                });
            }
        })
    }

    /// Restore the connection and respawn any delivery loop that stopped
    /// while disconnected. Always succeeds for the in-process transport;
    /// the bounded-attempt loop in `ensure_connected` is the contract
    /// remote implementations follow.
    fn restore(&self) {
        let _ = self
            .connections
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst);
        let mut subs = self.subscriptions.lock();
        let kinds: Vec<AgentKind> = subs
            .iter()
            .filter(|(_, sub)| sub.task.is_finished())
            .map(|(kind, _)| *kind)
            .collect();
        for kind in kinds {
            if let Some(sub) = subs.get(&kind) {
                let handler = Arc::clone(&sub.handler);
                let task = self.spawn_delivery(kind, Arc::clone(&handler));
                subs.insert(kind, Subscription { handler, task });
            }
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.connections.load(Ordering::SeqCst) > 0 {
            return Ok(());
        }
        let backoff = Duration::from_millis(self.config.reconnect_backoff_millis);
        for attempt in 1..=self.config.reconnect_max_attempts {
            tokio::time::sleep(backoff).await;
            self.restore();
            if self.connections.load(Ordering::SeqCst) > 0 {
                self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                info!(attempt, "Reconnected to the message bus");
                return Ok(());
            }
        }
        Err(MeshError::NotConnected)
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn connect(&self) -> Result<()> {
        let previous = self.connections.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            self.restore();
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let previous = self.connections.fetch_sub(1, Ordering::SeqCst);
        if previous <= 1 {
            self.connections.store(0, Ordering::SeqCst);
            let subs = self.subscriptions.lock();
            for sub in subs.values() {
                sub.task.abort();
            }
        }
        Ok(())
    }

    async fn publish(&self, message: AgentMessage) -> Result<()> {
        self.ensure_connected().await?;
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(message) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(unsent)) => {
                if unsent.requires_ack {
                    Err(MeshError::Bus(format!(
                        "no subscriber to acknowledge message {}",
                        unsent.id
                    )))
                } else {
                    debug!(msg_id = %unsent.id, "Published with no active subscribers");
                    Ok(())
                }
            }
        }
    }

    async fn subscribe(&self, kind: AgentKind, handler: Arc<dyn BusHandler>) -> Result<()> {
        let mut subs = self.subscriptions.lock();
        if subs.contains_key(&kind) {
            return Err(MeshError::HandlerExists(kind.to_string()));
        }
        let task = self.spawn_delivery(kind, Arc::clone(&handler));
        subs.insert(kind, Subscription { handler, task });
        Ok(())
    }

    async fn unsubscribe(&self, kind: AgentKind) -> Result<()> {
        if let Some(sub) = self.subscriptions.lock().remove(&kind) {
            sub.task.abort();
        }
        Ok(())
    }

    async fn create_dead_letter_route(&self, kind: AgentKind) -> Result<()> {
        let inserted = self.dead_letter_routes.lock().insert(kind);
        if inserted {
            debug!(agent = %kind, "Dead-letter route established");
        }
        Ok(())
    }
}
