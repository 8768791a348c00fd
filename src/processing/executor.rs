//! Blocking steps of one item's pipeline.
//!
//! Each step runs inside `tokio::task::spawn_blocking` so decoding, enhancing
//! and writing never stall the runtime. The queue calls the steps one by one
//! and records progress between them.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use crate::cache::ArtifactCache;
use crate::core::{Artifact, EnhanceMode, SourceRef, WorkItem};
use crate::utils::{ItemError, SupportedFormat, output_path_for};
use super::{Enhancer, Storage, encode_artifact};

/// Everything a pipeline step needs to know about the item, detached from the queue.
#[derive(Debug, Clone)]
pub struct ItemJob {
    pub source: SourceRef,
    pub mode: EnhanceMode,
    pub format: SupportedFormat,
    pub cache_key: String,
    pub output_path: PathBuf,
}

impl From<&WorkItem> for ItemJob {
    fn from(item: &WorkItem) -> Self {
        Self {
            source: item.source().clone(),
            mode: item.mode(),
            format: item.format(),
            cache_key: item.source().cache_key(item.mode()),
            output_path: output_path_for(item.source().path(), item.mode(), item.format()),
        }
    }
}

async fn run_blocking<T, F>(step: &'static str, f: F) -> Result<T, ItemError>
where
    F: FnOnce() -> Result<T, ItemError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ItemError::Aborted(format!("{step}: {e}")))?
}

/// Runs pipeline steps against the injected collaborators.
#[derive(Clone)]
pub struct ItemExecutor {
    enhancer: Arc<dyn Enhancer>,
    storage: Arc<dyn Storage>,
    cache: Arc<ArtifactCache>,
    lossy_quality: u8,
}

impl ItemExecutor {
    pub fn new(
        enhancer: Arc<dyn Enhancer>,
        storage: Arc<dyn Storage>,
        cache: Arc<ArtifactCache>,
        lossy_quality: u8,
    ) -> Self {
        Self { enhancer, storage, cache, lossy_quality }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Previously produced artifact for this source and mode, if cached.
    pub async fn cached(&self, job: &ItemJob) -> Option<Arc<Artifact>> {
        let cache = self.cache.clone();
        let key = job.cache_key.clone();
        run_blocking("cache lookup", move || Ok(cache.get(&key)))
            .await
            .ok()
            .flatten()
    }

    pub async fn load(&self, job: &ItemJob) -> Result<Vec<u8>, ItemError> {
        let storage = self.storage.clone();
        let source = job.source.clone();
        let bytes = run_blocking("load", move || Ok(storage.load_bytes(&source)?)).await?;
        debug!("Loaded {} ({} bytes)", job.source.file_name(), bytes.len());
        Ok(bytes)
    }

    /// Enhances `input` and decodes the result into an artifact.
    pub async fn enhance(&self, input: Vec<u8>, mode: EnhanceMode) -> Result<Arc<Artifact>, ItemError> {
        let enhancer = self.enhancer.clone();
        run_blocking("enhance", move || {
            let output = enhancer.enhance(&input, mode)?;
            let artifact = Artifact::decode(&output).map_err(|e| ItemError::Decode(e.to_string()))?;
            Ok(Arc::new(artifact))
        })
        .await
    }

    /// Stores the artifact in the cache; disk persistence happens in the background.
    pub fn remember(&self, job: &ItemJob, artifact: Arc<Artifact>) {
        self.cache.set(&job.cache_key, artifact);
    }

    /// Encodes the artifact for the source format and writes it to the output path.
    pub async fn persist(&self, job: &ItemJob, artifact: Arc<Artifact>) -> Result<PathBuf, ItemError> {
        let storage = self.storage.clone();
        let encoding = job.format.output_encoding(self.lossy_quality);
        let destination = job.output_path.clone();

        run_blocking("write", move || {
            let bytes = encode_artifact(&artifact, encoding)?;
            storage
                .write_bytes(&bytes, &destination)
                .map_err(|e| ItemError::Write(e.to_string()))?;
            Ok(destination)
        })
        .await
    }
}
