use parking_lot::Mutex;
use sysinfo::System;
use crate::utils::TelemetryError;

/// Raw physical memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
}

/// Anything that can report physical memory usage.
pub trait MemorySource: Send + Sync + 'static {
    fn sample(&self) -> Result<MemorySample, TelemetryError>;
}

/// Reads memory statistics from the operating system via `sysinfo`.
pub struct SystemMemorySource {
    system: Mutex<System>,
}

impl SystemMemorySource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for SystemMemorySource {
    fn sample(&self) -> Result<MemorySample, TelemetryError> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let total_bytes = system.total_memory();
        // Some sandboxes report zero; treat it as "no data" rather than 0% usage
        if total_bytes == 0 {
            return Err(TelemetryError::Unavailable("total memory reported as 0".to_string()));
        }

        Ok(MemorySample {
            total_bytes,
            available_bytes: system.available_memory(),
            used_bytes: system.used_memory(),
        })
    }
}
