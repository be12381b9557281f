use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{MeshError, Result};

/// Top-level configuration, one section per subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub bus: BusConfig,
    pub runtime: RuntimeConfig,
    pub health: HealthConfig,
    pub similarity: SimilarityConfig,
    pub http: HttpConfig,
}

impl MeshConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let config: Self = if path.exists() {
            let content = fs::read_to_string(path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self).map_err(|e| MeshError::Config(e.to_string()))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.bus.channel_capacity == 0 {
            errors.push("bus.channel_capacity must be greater than 0");
        }
        if self.bus.prefetch_count == 0 {
            errors.push("bus.prefetch_count must be greater than 0");
        }
        if self.bus.reconnect_max_attempts == 0 {
            errors.push("bus.reconnect_max_attempts must be greater than 0");
        }

        if self.runtime.max_concurrent_tasks == 0 {
            errors.push("runtime.max_concurrent_tasks must be greater than 0");
        }
        if self.runtime.drain_timeout_secs == 0 {
            errors.push("runtime.drain_timeout_secs must be greater than 0");
        }
        if self.runtime.drain_poll_millis == 0 {
            errors.push("runtime.drain_poll_millis must be greater than 0");
        }

        if self.health.interval_secs == 0 {
            errors.push("health.interval_secs must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.similarity.threshold) {
            errors.push("similarity.threshold must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.similarity.segment_threshold) {
            errors.push("similarity.segment_threshold must be between 0.0 and 1.0");
        }
        if self.similarity.cache_capacity == 0 {
            errors.push("similarity.cache_capacity must be greater than 0");
        }
        if self.similarity.shingle_size == 0 {
            errors.push("similarity.shingle_size must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MeshError::Config(errors.join("; ")))
        }
    }
}

/// Message bus transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of the underlying broadcast channel.
    pub channel_capacity: usize,
    /// In-flight deliveries allowed per subscription before backpressure.
    pub prefetch_count: usize,
    /// Delivery attempts before a message is routed to the dead-letter queue.
    pub handler_retries: u32,
    pub reconnect_max_attempts: u32,
    pub reconnect_backoff_millis: u64,
    pub dead_letter_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            prefetch_count: 8,
            handler_retries: 2,
            reconnect_max_attempts: 5,
            reconnect_backoff_millis: 500,
            dead_letter_capacity: 1000,
        }
    }
}

/// Per-agent runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Hard admission bound; tasks beyond this are rejected, never queued.
    pub max_concurrent_tasks: usize,
    pub drain_timeout_secs: u64,
    pub drain_poll_millis: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            drain_timeout_secs: 30,
            drain_poll_millis: 100,
        }
    }
}

/// Health reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// Content-similarity engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Overall similarity above which a pair is flagged a match.
    pub threshold: f64,
    /// Sentence-level Jaccard cutoff for matched segments.
    pub segment_threshold: f64,
    /// Maximum matched segments reported per source.
    pub max_segments_per_source: usize,
    pub cache_capacity: usize,
    pub shingle_size: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            segment_threshold: 0.7,
            max_segments_per_source: 3,
            cache_capacity: 1000,
            shingle_size: 5,
        }
    }
}

/// Health/metrics HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MeshConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.runtime.max_concurrent_tasks, 5);
        assert_eq!(config.similarity.cache_capacity, 1000);
        assert_eq!(config.similarity.shingle_size, 5);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = MeshConfig::default();
        config.runtime.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = MeshConfig::default();
        config.similarity.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_roundtrip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = MeshConfig::default();
        config.runtime.max_concurrent_tasks = 3;
        config.save(&path).await.unwrap();

        let loaded = MeshConfig::load(&path).await.unwrap();
        assert_eq!(loaded.runtime.max_concurrent_tasks, 3);
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = MeshConfig::load(&dir.path().join("missing.toml"))
            .await
            .unwrap();
        assert_eq!(loaded.bus.prefetch_count, BusConfig::default().prefetch_count);
    }
}
