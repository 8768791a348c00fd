// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod telemetry;
pub mod cache;
pub mod history;
pub mod processing;
pub mod worker;

// Public exports for external consumers
pub use crate::core::{
    Artifact, Engine, EngineConfig, EnhanceMode, ItemSnapshot, ItemStatus, QueueEvent, QueueSnapshot,
    SourceRef,
};
pub use crate::cache::{ArtifactCache, CacheStats};
pub use crate::history::{HistoryEntry, HistoryStack, RecentFiles};
pub use crate::processing::{Enhancer, FsStorage, Storage, UpscaleEnhancer};
pub use crate::telemetry::{MemoryPressure, MemorySnapshot, MemorySource, MemoryTelemetry, SystemMemorySource};
pub use crate::worker::{Admission, BatchQueue, QueueError, Rejection};
pub use crate::utils::{AdmissionError, EngineError, EngineResult, EnhanceError, ItemError, StorageError};

// The command-line entry point lives in main.rs and uses this crate as a library.
