//! Registry of live agents backing the health endpoints.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::runtime::{HealthSource, ResourceProbe};

#[derive(Debug, Clone, Serialize)]
pub struct AgentMetrics {
    pub agent_id: String,
    pub healthy: bool,
    pub uptime_secs: u64,
    pub active_tasks: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub avg_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub uptime_secs: u64,
    pub memory_ratio: f64,
    pub cpu_percent: f32,
    pub agents: Vec<AgentMetrics>,
}

/// Aggregates per-agent health snapshots for the process-level surface.
pub struct AgentRegistry {
    sources: RwLock<Vec<Arc<dyn HealthSource>>>,
    probe: Mutex<ResourceProbe>,
    started_at: Instant,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            probe: Mutex::new(ResourceProbe::new()),
            started_at: Instant::now(),
        }
    }

    pub fn register(&self, source: Arc<dyn HealthSource>) {
        self.sources.write().push(source);
    }

    pub fn liveness(&self) -> bool {
        true
    }

    /// Ready when at least one registered agent reports healthy.
    pub fn readiness(&self) -> bool {
        self.sources
            .read()
            .iter()
            .any(|source| source.snapshot().healthy)
    }

    pub fn metrics(&self) -> MetricsReport {
        let sample = self.probe.lock().sample();
        let agents = self
            .sources
            .read()
            .iter()
            .map(|source| {
                let snapshot = source.snapshot();
                AgentMetrics {
                    agent_id: source.agent_id(),
                    healthy: snapshot.healthy,
                    uptime_secs: snapshot.uptime_secs,
                    active_tasks: snapshot.active_tasks,
                    completed_tasks: snapshot.completed_tasks,
                    failed_tasks: snapshot.failed_tasks,
                    avg_duration_ms: snapshot.avg_duration_ms,
                }
            })
            .collect();

        MetricsReport {
            uptime_secs: self.started_at.elapsed().as_secs(),
            memory_ratio: sample.memory_ratio,
            cpu_percent: sample.cpu_percent,
            agents,
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
