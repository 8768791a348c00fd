//! Core domain types and engine wiring.
//!
//! - [`Engine`]: owns and connects every component
//! - [`WorkItem`] and [`ItemStatus`]: one unit of queued work and its state machine
//! - [`EnhanceMode`], [`SourceRef`], [`Artifact`]: what goes in and what comes out
//! - [`QueueSnapshot`] and [`QueueEvent`]: what observers see
//! - [`EngineConfig`]: tunables loaded from TOML

mod config;
mod progress;
mod state;
mod task;
mod types;

pub use config::{CacheConfig, EngineConfig, HistoryConfig, OutputConfig, QueueConfig, TelemetryConfig};
pub use progress::{ItemSnapshot, PauseReason, ProgressUpdate, QueueEvent, QueueSnapshot, StatusCounts};
pub use state::Engine;
pub use task::{ItemStatus, WorkItem, PROGRESS_DONE, PROGRESS_ENHANCED, PROGRESS_LOADED, PROGRESS_STARTED};
pub use types::{Artifact, EnhanceMode, SourceRef, decode_image};
