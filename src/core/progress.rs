use std::path::PathBuf;
use serde::Serialize;
use uuid::Uuid;
use crate::core::{EnhanceMode, ItemStatus, SourceRef, WorkItem};

/// Read-only view of one work item for observers
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: Uuid,
    pub file_name: String,
    pub source: SourceRef,
    pub mode: EnhanceMode,
    pub status: ItemStatus,
    /// Fraction in [0, 1]
    pub progress: f64,
    pub output_path: Option<PathBuf>,
}

impl From<&WorkItem> for ItemSnapshot {
    fn from(item: &WorkItem) -> Self {
        Self {
            id: item.id(),
            file_name: item.source().file_name(),
            source: item.source().clone(),
            mode: item.mode(),
            status: item.status().clone(),
            progress: item.progress(),
            output_path: item.output_path().cloned(),
        }
    }
}

/// Per-status item counts, always recomputed from the item list.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a WorkItem>) -> Self {
        let mut counts = Self::default();
        for item in items {
            counts.total += 1;
            match item.status() {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::Processing => counts.processing += 1,
                ItemStatus::Completed => counts.completed += 1,
                ItemStatus::Failed(_) => counts.failed += 1,
                ItemStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    /// Aggregate progress: (completed + failed) / total, 0 for an empty queue
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed + self.failed) as f64 / self.total as f64
    }
}

/// Why the queue is held
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    /// Caller asked for it
    User,
    /// Memory telemetry reported critical pressure
    MemoryPressure,
}

/// Full observable state of a queue at one instant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub items: Vec<ItemSnapshot>,
    pub running: bool,
    /// True while held by the user or by memory pressure
    pub paused: bool,
    pub paused_by_user: bool,
    pub throttled: bool,
    pub current_item: Option<Uuid>,
    pub counts: StatusCounts,
    pub progress: f64,
}

impl QueueSnapshot {
    pub fn progress_percentage(&self) -> usize {
        (self.progress * 100.0).round() as usize
    }

    pub fn item(&self, id: Uuid) -> Option<&ItemSnapshot> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Simplified progress update for progress bars
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub total_tasks: usize,
    pub progress_percentage: usize,
    pub status: String,
}

impl ProgressUpdate {
    pub fn new(counts: &StatusCounts, status: &str) -> Self {
        Self {
            completed_tasks: counts.completed,
            failed_tasks: counts.failed,
            total_tasks: counts.total,
            progress_percentage: (counts.progress() * 100.0).round() as usize,
            status: status.to_string(),
        }
    }
}

/// Events broadcast by a queue to its subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueEvent {
    Submitted { accepted: usize, rejected: usize },
    Started,
    ItemUpdated { item: ItemSnapshot },
    Progress(ProgressUpdate),
    Paused { reason: PauseReason },
    Resumed { reason: PauseReason },
    Finished(ProgressUpdate),
    Cancelled,
    Cleared,
    Removed { id: Uuid },
}
