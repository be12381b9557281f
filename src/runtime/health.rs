//! Health snapshot types and process resource sampling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};

/// Point-in-time self-report of a single agent. A live gauge, recomputed
/// on the health interval and never persisted historically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// `running && active_tasks < max_concurrent_tasks`.
    pub healthy: bool,
    pub uptime_secs: u64,
    pub last_check: DateTime<Utc>,
    pub memory_ratio: f64,
    pub cpu_percent: f32,
    pub active_tasks: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub avg_duration_ms: u64,
}

/// Anything that can report a health snapshot; implemented by the agent
/// runtime and consumed by the metrics surface.
pub trait HealthSource: Send + Sync {
    fn agent_id(&self) -> String;
    fn snapshot(&self) -> HealthSnapshot;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceSample {
    pub memory_ratio: f64,
    pub cpu_percent: f32,
}

/// Samples process memory and cpu via sysinfo.
pub struct ResourceProbe {
    system: System,
    pid: Option<Pid>,
}

impl ResourceProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn sample(&mut self) -> ResourceSample {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let memory_ratio = if total > 0 {
            used as f64 / total as f64
        } else {
            0.0
        };

        let cpu_percent = match self.pid {
            Some(pid) => {
                self.system.refresh_process(pid);
                self.system
                    .process(pid)
                    .map(|p| p.cpu_usage())
                    .unwrap_or(0.0)
            }
            None => 0.0,
        };

        ResourceSample {
            memory_ratio,
            cpu_percent,
        }
    }
}

impl Default for ResourceProbe {
    fn default() -> Self {
        Self::new()
    }
}
