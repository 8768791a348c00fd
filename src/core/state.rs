//! Explicit wiring of the engine's components.

use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{debug, info};
use crate::cache::ArtifactCache;
use crate::core::{EngineConfig, SourceRef};
use crate::history::{HistoryStack, RecentFiles, DEFAULT_RECENT_LIMIT};
use crate::processing::{Enhancer, ItemExecutor, Storage};
use crate::telemetry::{MemoryPressure, MemorySource, MemoryTelemetry};
use crate::utils::EngineResult;
use crate::worker::BatchQueue;

/// Owns telemetry, cache, history and the batch queue.
///
/// Every collaborator is injected, so tests can swap in doubles for the
/// enhancer, the storage and the memory source.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    telemetry: Arc<MemoryTelemetry>,
    cache: Arc<ArtifactCache>,
    history: Arc<Mutex<HistoryStack>>,
    recent: Arc<Mutex<RecentFiles>>,
    queue: BatchQueue,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        enhancer: Arc<dyn Enhancer>,
        storage: Arc<dyn Storage>,
        memory: Arc<dyn MemorySource>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let telemetry = Arc::new(MemoryTelemetry::new(memory, config.telemetry.clone()));
        let cache = Arc::new(ArtifactCache::new(&config.cache));
        let history = Arc::new(Mutex::new(HistoryStack::new(config.history.max_entries)));
        let recent = Arc::new(Mutex::new(RecentFiles::new(DEFAULT_RECENT_LIMIT)));

        let executor = ItemExecutor::new(enhancer, storage, cache.clone(), config.output.lossy_quality);
        let queue = BatchQueue::new(
            config.queue.clone(),
            executor,
            telemetry.clone(),
            history.clone(),
            recent.clone(),
        );

        debug!(
            "Engine initialized (queue cap {}, cache {} items / {} bytes)",
            config.queue.max_queue_size, config.cache.max_items, config.cache.max_bytes
        );

        Ok(Self {
            config: Arc::new(config),
            telemetry,
            cache,
            history,
            recent,
            queue,
        })
    }

    /// Takes a first memory sample and starts periodic polling.
    pub fn start_telemetry(&self) -> bool {
        self.telemetry.refresh();
        self.telemetry.start()
    }

    /// Forwards a platform low-memory notification.
    ///
    /// Anything above normal also flushes the cache's fast tier.
    pub fn handle_memory_event(&self, level: MemoryPressure) {
        self.telemetry.report_pressure_event(level);
        if level > MemoryPressure::Normal {
            self.cache.purge_memory();
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    pub fn telemetry(&self) -> &Arc<MemoryTelemetry> {
        &self.telemetry
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn history(&self) -> &Arc<Mutex<HistoryStack>> {
        &self.history
    }

    /// Sources that completed most recently, newest first
    pub fn recent_files(&self) -> Vec<SourceRef> {
        self.recent.lock().list()
    }

    pub fn clear_recent_files(&self) {
        self.recent.lock().clear();
    }

    /// Stops telemetry polling and cancels any run in progress.
    pub fn shutdown(&self) {
        if self.queue.is_running() {
            self.queue.cancel();
        }
        self.telemetry.stop();
        info!("Engine shut down");
    }
}
