//! Bounded batch queue: admission, control API and observation.
//!
//! Items live in a `parking_lot` mutex that is never held across an await.
//! Run state lives in a `watch` channel so the worker can await changes
//! (pause, resume, cancel) instead of sleeping.

use std::sync::Arc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::core::{
    EnhanceMode, ItemSnapshot, PauseReason, ProgressUpdate, QueueConfig, QueueEvent,
    QueueSnapshot, SourceRef, StatusCounts, WorkItem,
};
use crate::history::{HistoryStack, RecentFiles};
use crate::processing::ItemExecutor;
use crate::telemetry::MemoryTelemetry;
use crate::utils::{AdmissionError, SupportedFormat, check_capacity, check_dimensions, format_from_extension};
use super::error::{QueueError, QueueResult};

/// One refused source and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub source: SourceRef,
    pub reason: AdmissionError,
}

impl Rejection {
    pub fn reason_text(&self) -> String {
        self.reason.to_string()
    }
}

/// Outcome of a submission; partial acceptance is normal.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    /// Ids of the new items, in submission order
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<Rejection>,
}

impl Admission {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// Run state shared with the worker.
///
/// `epoch` changes on every start and cancel; a worker whose epoch is stale
/// stops at its next safe point.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Control {
    pub running: bool,
    pub paused_by_user: bool,
    pub throttled: bool,
    pub epoch: u64,
    pub current: Option<Uuid>,
}

impl Control {
    pub fn is_live(&self, epoch: u64) -> bool {
        self.running && self.epoch == epoch
    }
}

pub(super) struct QueueShared {
    pub config: QueueConfig,
    pub items: Mutex<Vec<WorkItem>>,
    pub control: watch::Sender<Control>,
    pub events: broadcast::Sender<QueueEvent>,
    pub telemetry: Arc<MemoryTelemetry>,
    pub executor: ItemExecutor,
    pub history: Arc<Mutex<HistoryStack>>,
    pub recent: Arc<Mutex<RecentFiles>>,
    /// Single permit: at most one item is ever inside the pipeline
    pub lane: Semaphore,
    pub worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueueShared {
    pub fn emit(&self, event: QueueEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(self.items.lock().iter())
    }

    pub fn emit_progress(&self, status: &str) {
        let counts = self.counts();
        self.emit(QueueEvent::Progress(ProgressUpdate::new(&counts, status)));
    }

    /// Applies `change` to item `id` and publishes it when something changed.
    pub fn update_item(&self, id: Uuid, change: impl FnOnce(&mut WorkItem) -> bool) -> bool {
        let snapshot = {
            let mut items = self.items.lock();
            let Some(item) = items.iter_mut().find(|item| item.id() == id) else {
                return false;
            };
            if !change(item) {
                return false;
            }
            ItemSnapshot::from(&*item)
        };
        self.emit(QueueEvent::ItemUpdated { item: snapshot });
        true
    }
}

/// Sequential, memory-aware queue of enhancement work.
///
/// Cloning is cheap and every clone controls the same queue.
#[derive(Clone)]
pub struct BatchQueue {
    shared: Arc<QueueShared>,
}

impl BatchQueue {
    pub fn new(
        config: QueueConfig,
        executor: ItemExecutor,
        telemetry: Arc<MemoryTelemetry>,
        history: Arc<Mutex<HistoryStack>>,
        recent: Arc<Mutex<RecentFiles>>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (control, _) = watch::channel(Control::default());
        Self {
            shared: Arc::new(QueueShared {
                config,
                items: Mutex::new(Vec::new()),
                control,
                events,
                telemetry,
                executor,
                history,
                recent,
                lane: Semaphore::new(1),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Admits `sources` as new pending items in `mode`.
    ///
    /// Each source is checked in turn for queue room, a supported format,
    /// duplicates and (when the header can be read) dimensions.
    pub fn submit<I, S>(&self, sources: I, mode: EnhanceMode) -> Admission
    where
        I: IntoIterator<Item = S>,
        S: Into<SourceRef>,
    {
        let storage = self.shared.executor.storage();
        let limit = self.shared.config.max_image_dimension;

        // Format and header probing touch nothing shared, so run them unlocked
        let candidates: Vec<(SourceRef, Result<SupportedFormat, AdmissionError>, Option<(u32, u32)>)> = sources
            .into_iter()
            .map(Into::into)
            .map(|source: SourceRef| {
                let format = format_from_extension(source.path());
                let dimensions = match format {
                    Ok(_) => storage.header_dimensions(&source),
                    Err(_) => None,
                };
                if format.is_ok() && dimensions.is_none() {
                    debug!("Could not read dimensions of {}, accepting", source);
                }
                (source, format, dimensions)
            })
            .collect();

        let mut admission = Admission::default();
        let total = {
            let mut items = self.shared.items.lock();
            for (source, format, dimensions) in candidates {
                let admitted = check_capacity(items.len(), self.shared.config.max_queue_size)
                    .and(format)
                    .and_then(|format| {
                        if items.iter().any(|item| item.source() == &source) {
                            return Err(AdmissionError::Duplicate);
                        }
                        check_dimensions(dimensions, limit)?;
                        Ok(format)
                    });

                match admitted {
                    Ok(format) => {
                        let item = WorkItem::new(source, mode, format);
                        admission.accepted.push(item.id());
                        items.push(item);
                    }
                    Err(reason) => {
                        debug!("Rejected {}: {}", source, reason);
                        admission.rejected.push(Rejection { source, reason });
                    }
                }
            }
            items.len()
        };

        info!(
            "Batch queue: added {}, rejected {}, total {}",
            admission.accepted.len(),
            admission.rejected.len(),
            total
        );
        self.shared.emit(QueueEvent::Submitted {
            accepted: admission.accepted.len(),
            rejected: admission.rejected.len(),
        });
        admission
    }

    /// Launches the worker over the current pending items.
    ///
    /// Returns `Ok(false)` when already running or nothing is pending.
    pub fn start(&self) -> QueueResult<bool> {
        let handle = Handle::try_current()?;
        let pending = self.shared.counts().pending;

        let mut epoch = None;
        self.shared.control.send_if_modified(|control| {
            if control.running || pending == 0 {
                return false;
            }
            control.running = true;
            control.paused_by_user = false;
            control.throttled = false;
            control.epoch += 1;
            epoch = Some(control.epoch);
            true
        });

        let Some(epoch) = epoch else {
            debug!("Start ignored (running or no pending items)");
            return Ok(false);
        };

        info!("Starting batch processing: {} pending items", pending);
        self.spawn_worker(&handle, epoch);
        self.shared.emit(QueueEvent::Started);
        Ok(true)
    }

    fn spawn_worker(&self, handle: &Handle, epoch: u64) {
        let shared = self.shared.clone();
        let task = handle.spawn(async move { shared.run(epoch).await });
        *self.shared.worker.lock() = Some(task);
    }

    fn worker_alive(&self) -> bool {
        self.shared
            .worker
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Holds the queue at the next safe point. Returns false if already paused.
    pub fn pause(&self) -> bool {
        let changed = self.shared.control.send_if_modified(|control| {
            !std::mem::replace(&mut control.paused_by_user, true)
        });
        if changed {
            info!("Batch processing paused");
            self.shared.emit(QueueEvent::Paused { reason: PauseReason::User });
        }
        changed
    }

    /// Clears a user pause, relaunching the worker if it is gone.
    pub fn resume(&self) -> bool {
        let changed = self.shared.control.send_if_modified(|control| {
            std::mem::replace(&mut control.paused_by_user, false)
        });
        if !changed {
            return false;
        }
        info!("Batch processing resumed");
        self.shared.emit(QueueEvent::Resumed { reason: PauseReason::User });

        let control = *self.shared.control.borrow();
        if control.running && !self.worker_alive() {
            match Handle::try_current() {
                Ok(handle) => {
                    debug!("Relaunching queue worker");
                    self.spawn_worker(&handle, control.epoch);
                }
                Err(_) => warn!("Cannot relaunch queue worker outside a Tokio runtime"),
            }
        }
        true
    }

    /// Stops the run and cancels every pending or processing item.
    ///
    /// A transform already in flight finishes on its own; its result is discarded.
    pub fn cancel(&self) {
        self.shared.control.send_modify(|control| {
            control.running = false;
            control.paused_by_user = false;
            control.throttled = false;
            control.current = None;
            control.epoch += 1;
        });

        let cancelled: Vec<ItemSnapshot> = {
            let mut items = self.shared.items.lock();
            items
                .iter_mut()
                .filter_map(|item| item.cancel().then(|| ItemSnapshot::from(&*item)))
                .collect()
        };

        info!("Batch processing cancelled ({} items)", cancelled.len());
        for item in cancelled {
            self.shared.emit(QueueEvent::ItemUpdated { item });
        }
        self.shared.emit(QueueEvent::Cancelled);
        self.shared.emit_progress("cancelled");
    }

    /// Cancels, then drops every item.
    pub fn clear_queue(&self) {
        self.cancel();
        self.shared.items.lock().clear();
        info!("Batch queue cleared");
        self.shared.emit(QueueEvent::Cleared);
    }

    /// Removes a pending or failed item.
    pub fn remove_item(&self, id: Uuid) -> QueueResult<()> {
        let removed = {
            let mut items = self.shared.items.lock();
            let index = items
                .iter()
                .position(|item| item.id() == id)
                .ok_or(QueueError::ItemNotFound(id))?;
            let status = items[index].status();
            if !status.is_removable() {
                return Err(QueueError::NotRemovable { id, status: status.label() });
            }
            items.remove(index)
        };

        info!("Removed item: {}", removed.source().file_name());
        self.shared.emit(QueueEvent::Removed { id });
        self.shared.emit_progress("processing");
        Ok(())
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let control = *self.shared.control.borrow();
        let (items, counts) = {
            let items = self.shared.items.lock();
            (
                items.iter().map(ItemSnapshot::from).collect::<Vec<_>>(),
                StatusCounts::tally(items.iter()),
            )
        };
        QueueSnapshot {
            items,
            running: control.running,
            paused: control.paused_by_user || control.throttled,
            paused_by_user: control.paused_by_user,
            throttled: control.throttled,
            current_item: control.current,
            progress: counts.progress(),
            counts,
        }
    }

    pub fn item(&self, id: Uuid) -> Option<ItemSnapshot> {
        self.shared
            .items
            .lock()
            .iter()
            .find(|item| item.id() == id)
            .map(ItemSnapshot::from)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shared.control.borrow().running
    }

    /// True while held by the user or by memory pressure
    pub fn is_paused(&self) -> bool {
        let control = self.shared.control.borrow();
        control.paused_by_user || control.throttled
    }

    pub fn len(&self) -> usize {
        self.shared.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves once the queue is not running.
    pub async fn wait_until_idle(&self) {
        let mut control = self.shared.control.subscribe();
        // The sender lives in `self`, so `changed` cannot fail while we wait
        while control.borrow_and_update().running {
            if control.changed().await.is_err() {
                break;
            }
        }
    }
}
