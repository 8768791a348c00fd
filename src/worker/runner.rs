//! The sequential worker loop.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::core::{
    Artifact, ItemStatus, PauseReason, ProgressUpdate, QueueEvent, PROGRESS_ENHANCED, PROGRESS_LOADED,
};
use crate::processing::ItemJob;
use crate::utils::ItemError;
use super::queue::QueueShared;

impl QueueShared {
    /// Visits the items pending at launch, in order, one at a time.
    pub(super) async fn run(self: Arc<Self>, epoch: u64) {
        let pending: Vec<Uuid> = self
            .items
            .lock()
            .iter()
            .filter(|item| *item.status() == ItemStatus::Pending)
            .map(|item| item.id())
            .collect();
        debug!("Worker {} picked up {} items", epoch, pending.len());

        for id in pending {
            if !self.hold_at_safe_point(epoch).await {
                debug!("Worker {} stopping early", epoch);
                break;
            }

            // Only one item inside the pipeline, even across a cancel and restart
            let Ok(_lane) = self.lane.acquire().await else { break };
            if !self.control.borrow().is_live(epoch) {
                break;
            }

            let Some(job) = self.begin(id) else { continue };
            self.process(id, job).await;
        }

        self.finish(epoch);
    }

    /// Waits out user pauses and memory pressure.
    ///
    /// Returns false when the run was cancelled or superseded meanwhile.
    async fn hold_at_safe_point(&self, epoch: u64) -> bool {
        loop {
            if !self.wait_while_paused(epoch).await {
                return false;
            }
            if !self.telemetry.should_throttle() {
                return true;
            }
            if !self.wait_for_memory(epoch).await {
                return false;
            }
        }
    }

    async fn wait_while_paused(&self, epoch: u64) -> bool {
        let mut control = self.control.subscribe();
        loop {
            {
                let state = control.borrow_and_update();
                if !state.is_live(epoch) {
                    return false;
                }
                if !state.paused_by_user {
                    return true;
                }
            }
            // Wakes on any control change; the timeout only bounds a missed wakeup
            let _ = tokio::time::timeout(self.config.pause_poll(), control.changed()).await;
        }
    }

    pub(super) async fn wait_for_memory(&self, epoch: u64) -> bool {
        let mut memory = self.telemetry.subscribe();
        let mut control = self.control.subscribe();
        if !control.borrow_and_update().is_live(epoch) {
            return false;
        }

        warn!("Memory pressure critical, pausing batch processing");
        self.executor.cache().purge_memory();
        let raised = self.control.send_if_modified(|state| {
            if !state.is_live(epoch) {
                return false;
            }
            state.throttled = true;
            true
        });
        if !raised {
            return false;
        }
        self.emit(QueueEvent::Paused { reason: PauseReason::MemoryPressure });

        let recovered = loop {
            if !control.borrow_and_update().is_live(epoch) {
                break false;
            }
            if !memory.borrow_and_update().should_throttle() {
                break true;
            }
            tokio::select! {
                _ = memory.changed() => {}
                _ = control.changed() => {}
                _ = tokio::time::sleep(self.config.throttle_poll()) => {}
            }
        };

        if recovered {
            let still_live = self.control.send_if_modified(|state| {
                if !state.is_live(epoch) {
                    return false;
                }
                state.throttled = false;
                true
            });
            if !still_live {
                return false;
            }
            info!("Memory pressure relieved, resuming");
            self.emit(QueueEvent::Resumed { reason: PauseReason::MemoryPressure });
        }
        recovered
    }

    /// Moves a still-pending item to processing and detaches its job.
    fn begin(&self, id: Uuid) -> Option<ItemJob> {
        let mut job = None;
        self.update_item(id, |item| {
            if !item.begin() {
                return false;
            }
            job = Some(ItemJob::from(&*item));
            true
        });

        let job = job?;
        self.control.send_modify(|state| state.current = Some(id));
        info!("Processing: {} ({})", job.source.file_name(), job.mode.display_name());
        Some(job)
    }

    async fn process(&self, id: Uuid, job: ItemJob) {
        match self.pipeline(id, &job).await {
            Ok((artifact, output_path)) => {
                let saved = output_path.clone();
                if self.update_item(id, |item| item.complete(artifact.clone(), output_path)) {
                    info!("Saved: {}", saved.display());
                    self.history.lock().push(artifact, job.mode);
                    self.recent.lock().record(job.source.clone());
                }
            }
            Err(e) => {
                if self.update_item(id, |item| item.fail(e.to_string())) {
                    warn!("Failed: {} - {}", job.source.file_name(), e);
                } else {
                    debug!("Dropped result for {}: {}", job.source.file_name(), e);
                }
            }
        }
        self.emit_progress("processing");
    }

    /// Cache lookup, else load and enhance; then encode and write.
    async fn pipeline(&self, id: Uuid, job: &ItemJob) -> Result<(Arc<Artifact>, PathBuf), ItemError> {
        let artifact = match self.executor.cached(job).await {
            Some(artifact) => {
                debug!("Reusing cached artifact for {}", job.source.file_name());
                artifact
            }
            None => {
                let bytes = self.executor.load(job).await?;
                self.update_item(id, |item| item.advance(PROGRESS_LOADED));

                let artifact = self.executor.enhance(bytes, job.mode).await?;
                self.executor.remember(job, artifact.clone());
                artifact
            }
        };
        self.update_item(id, |item| item.advance(PROGRESS_ENHANCED));

        if !self.is_processing(id) {
            return Err(ItemError::Aborted("cancelled before write".to_string()));
        }

        let output_path = self.executor.persist(job, artifact.clone()).await?;
        Ok((artifact, output_path))
    }

    fn is_processing(&self, id: Uuid) -> bool {
        self.items
            .lock()
            .iter()
            .any(|item| item.id() == id && *item.status() == ItemStatus::Processing)
    }

    fn finish(&self, epoch: u64) {
        let finished = self.control.send_if_modified(|state| {
            if state.epoch != epoch || !state.running {
                return false;
            }
            state.running = false;
            state.paused_by_user = false;
            state.throttled = false;
            state.current = None;
            true
        });
        if !finished {
            return;
        }

        let counts = self.counts();
        info!(
            "Batch processing complete - Total: {}, Completed: {}, Failed: {}",
            counts.total, counts.completed, counts.failed
        );
        self.emit(QueueEvent::Finished(ProgressUpdate::new(&counts, "complete")));
    }
}
