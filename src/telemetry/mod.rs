//! System memory telemetry used for queue backpressure.
//!
//! - [`MemoryTelemetry`]: classification and snapshot publishing
//! - [`MemorySource`]: where samples come from ([`SystemMemorySource`] in production)

mod monitor;
mod source;

pub use monitor::{MemoryPressure, MemorySnapshot, MemoryTelemetry, classify_usage, format_memory_size};
pub use source::{MemorySample, MemorySource, SystemMemorySource};
