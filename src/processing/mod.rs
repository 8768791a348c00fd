//! Per-item processing and the collaborators it calls into.
//!
//! [`Enhancer`] and [`Storage`] are synchronous and may be slow; the
//! [`ItemExecutor`] runs every call on the blocking thread pool.

mod encode;
mod executor;
mod storage;
mod upscale;

use std::path::Path;
use crate::core::{EnhanceMode, SourceRef};
use crate::utils::{EnhanceError, StorageError};

pub use encode::encode_artifact;
pub use executor::{ItemExecutor, ItemJob};
pub use storage::FsStorage;
pub use upscale::{UpscaleEnhancer, DEFAULT_SCALE};

/// The transform applied to each item: encoded image in, encoded image out.
///
/// Implementations need not be safe to run concurrently with themselves;
/// the queue never overlaps two calls.
pub trait Enhancer: Send + Sync + 'static {
    fn enhance(&self, input: &[u8], mode: EnhanceMode) -> Result<Vec<u8>, EnhanceError>;
}

/// Source and destination access for the queue.
pub trait Storage: Send + Sync + 'static {
    fn load_bytes(&self, source: &SourceRef) -> Result<Vec<u8>, StorageError>;

    fn write_bytes(&self, bytes: &[u8], destination: &Path) -> Result<(), StorageError>;

    /// Pixel dimensions read cheaply at admission, `None` when unknown.
    fn header_dimensions(&self, _source: &SourceRef) -> Option<(u32, u32)> {
        None
    }
}
