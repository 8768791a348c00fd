//! Memory pressure telemetry.
//!
//! Keeps the last computed [`MemorySnapshot`] in a `watch` channel: readers
//! never block, and the batch queue awaits changes instead of sleeping.

use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::core::TelemetryConfig;
use super::source::{MemorySample, MemorySource};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Memory pressure classification, ordered from least to most severe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// Last known memory state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub pressure: MemoryPressure,
    pub used_mb: f64,
    pub available_mb: f64,
    pub total_mb: f64,
}

impl MemorySnapshot {
    pub fn usage_percentage(&self) -> f64 {
        if self.total_mb <= 0.0 {
            return 0.0;
        }
        (self.used_mb / self.total_mb) * 100.0
    }

    /// Heavy work should hold off while this is true
    pub fn should_throttle(&self) -> bool {
        self.pressure == MemoryPressure::Critical
    }
}

/// Derives a pressure level from a usage percentage.
///
/// Usage between the recovery and warning thresholds keeps the current
/// level, except that a critical level is lowered to warning.
pub fn classify_usage(current: MemoryPressure, usage: f64, config: &TelemetryConfig) -> MemoryPressure {
    if usage > config.critical_percent {
        MemoryPressure::Critical
    } else if usage > config.warning_percent {
        MemoryPressure::Warning
    } else if usage < config.recovery_percent {
        MemoryPressure::Normal
    } else {
        match current {
            MemoryPressure::Critical => MemoryPressure::Warning,
            level => level,
        }
    }
}

/// Formats a size in MB for display
pub fn format_memory_size(mb: f64) -> String {
    if mb < 1024.0 {
        format!("{:.1} MB", mb)
    } else {
        format!("{:.2} GB", mb / 1024.0)
    }
}

/// Polls a [`MemorySource`] and accepts pushed platform pressure events.
pub struct MemoryTelemetry {
    source: Arc<dyn MemorySource>,
    config: TelemetryConfig,
    snapshot: watch::Sender<MemorySnapshot>,
    /// Set by a platform event; the next poll may raise but not lower the level
    platform_hold: Mutex<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryTelemetry {
    pub fn new(source: Arc<dyn MemorySource>, config: TelemetryConfig) -> Self {
        let (snapshot, _) = watch::channel(MemorySnapshot::default());
        Self {
            source,
            config,
            snapshot,
            platform_hold: Mutex::new(false),
            poller: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        *self.snapshot.borrow()
    }

    pub fn pressure(&self) -> MemoryPressure {
        self.snapshot.borrow().pressure
    }

    pub fn should_throttle(&self) -> bool {
        self.snapshot.borrow().should_throttle()
    }

    /// Receiver notified on every refresh and every platform event
    pub fn subscribe(&self) -> watch::Receiver<MemorySnapshot> {
        self.snapshot.subscribe()
    }

    /// Adopts a pressure level reported by the platform immediately.
    pub fn report_pressure_event(&self, level: MemoryPressure) {
        *self.platform_hold.lock() = true;
        let previous = self.pressure();
        self.snapshot.send_modify(|snapshot| snapshot.pressure = level);

        match level {
            MemoryPressure::Critical => warn!("Memory pressure: CRITICAL (platform event)"),
            MemoryPressure::Warning => warn!("Memory pressure: WARNING (platform event)"),
            MemoryPressure::Normal => info!("Memory pressure: NORMAL (platform event, was {:?})", previous),
        }
    }

    /// Samples the source once and re-derives the classification.
    ///
    /// A failed sample keeps the previous snapshot untouched.
    pub fn refresh(&self) {
        let sample = match self.source.sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Failed to get memory statistics: {}", e);
                return;
            }
        };
        self.apply_sample(sample);
    }

    fn apply_sample(&self, sample: MemorySample) {
        let total_mb = sample.total_bytes as f64 / BYTES_PER_MB;
        let used_mb = sample.used_bytes as f64 / BYTES_PER_MB;
        let available_mb = sample.available_bytes as f64 / BYTES_PER_MB;

        let held = std::mem::take(&mut *self.platform_hold.lock());
        let previous = self.snapshot();

        let mut next = MemorySnapshot {
            pressure: previous.pressure,
            used_mb,
            available_mb,
            total_mb,
        };
        let derived = classify_usage(previous.pressure, next.usage_percentage(), &self.config);
        next.pressure = if held { derived.max(previous.pressure) } else { derived };

        if next.pressure != previous.pressure {
            info!(
                "Memory pressure {:?} -> {:?} (usage {:.1}%, available {})",
                previous.pressure,
                next.pressure,
                next.usage_percentage(),
                format_memory_size(available_mb)
            );
        } else {
            debug!(
                "Memory usage {:.1}% - Used: {}, Available: {}",
                next.usage_percentage(),
                format_memory_size(used_mb),
                format_memory_size(available_mb)
            );
        }

        self.snapshot.send_replace(next);
    }

    /// Starts periodic polling on the current tokio runtime.
    ///
    /// The task holds only a weak reference and ends when the telemetry is dropped.
    /// Returns false outside a runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("Memory telemetry needs a Tokio runtime to poll");
            return false;
        };
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return true;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.refresh_interval();
        debug!("Memory telemetry polling every {:?}", period);

        *poller = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(telemetry) = weak.upgrade() else { break };
                telemetry.refresh();
            }
        }));
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
            debug!("Memory telemetry stopped");
        }
    }
}

impl Drop for MemoryTelemetry {
    fn drop(&mut self) {
        self.stop();
    }
}
