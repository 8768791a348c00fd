//! Engine configuration.
//!
//! Every section has defaults matching the desktop application, so an empty
//! or partial TOML file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::utils::{EngineError, EngineResult, DEFAULT_LOSSY_QUALITY};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
    pub history: HistoryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Hard cap on items held by the queue
    pub max_queue_size: usize,
    /// Largest accepted width or height in pixels
    pub max_image_dimension: u32,
    /// Interval between checks while held by the user
    pub pause_poll_ms: u64,
    /// Interval between checks while held by memory pressure
    pub throttle_poll_ms: u64,
    /// Buffered events per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 30,
            max_image_dimension: 8192,
            pause_poll_ms: 100,
            throttle_poll_ms: 1000,
            event_capacity: 256,
        }
    }
}

impl QueueConfig {
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn throttle_poll(&self) -> Duration {
        Duration::from_millis(self.throttle_poll_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_items: usize,
    pub max_bytes: usize,
    /// Disk tier location; the platform cache dir when unset
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: 50,
            max_bytes: 100 * 1024 * 1024,
            directory: None,
        }
    }
}

impl CacheConfig {
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("image-enhancer")
                .join("artifacts")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub refresh_interval_ms: u64,
    /// Usage above this percentage is classified as warning
    pub warning_percent: f64,
    /// Usage above this percentage is classified as critical
    pub critical_percent: f64,
    /// Usage below this percentage clears a warning
    pub recovery_percent: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2000,
            warning_percent: 90.0,
            critical_percent: 95.0,
            recovery_percent: 80.0,
        }
    }
}

impl TelemetryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JPEG quality for lossy re-encodes (1-100)
    pub lossy_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { lossy_quality: DEFAULT_LOSSY_QUALITY }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| EngineError::config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.queue.max_queue_size == 0 {
            return Err(EngineError::config("queue.max_queue_size cannot be 0"));
        }
        if self.queue.max_image_dimension == 0 {
            return Err(EngineError::config("queue.max_image_dimension cannot be 0"));
        }
        if self.queue.event_capacity == 0 {
            return Err(EngineError::config("queue.event_capacity cannot be 0"));
        }
        if self.cache.max_items == 0 || self.cache.max_bytes == 0 {
            return Err(EngineError::config("cache limits cannot be 0"));
        }
        if self.history.max_entries == 0 {
            return Err(EngineError::config("history.max_entries cannot be 0"));
        }
        if self.telemetry.refresh_interval_ms == 0 {
            return Err(EngineError::config("telemetry.refresh_interval_ms cannot be 0"));
        }

        let t = &self.telemetry;
        if !(t.recovery_percent < t.warning_percent && t.warning_percent < t.critical_percent) {
            return Err(EngineError::config(format!(
                "telemetry thresholds must satisfy recovery < warning < critical (got {} / {} / {})",
                t.recovery_percent, t.warning_percent, t.critical_percent
            )));
        }

        if self.output.lossy_quality == 0 || self.output.lossy_quality > 100 {
            return Err(EngineError::config(format!(
                "Invalid quality value: {}. Must be between 1 and 100", self.output.lossy_quality
            )));
        }

        Ok(())
    }
}
