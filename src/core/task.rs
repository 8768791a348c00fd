//! Work item definition and its status state machine.

use std::path::PathBuf;
use std::sync::Arc;
use serde::Serialize;
use uuid::Uuid;
use crate::core::{Artifact, EnhanceMode, SourceRef};
use crate::utils::SupportedFormat;

/// Processing checkpoints reported on an item.
pub const PROGRESS_STARTED: f64 = 0.1;
pub const PROGRESS_LOADED: f64 = 0.3;
pub const PROGRESS_ENHANCED: f64 = 0.9;
pub const PROGRESS_DONE: f64 = 1.0;

/// Lifecycle of a work item.
///
/// `Pending → Processing → Completed | Failed`, and `Pending | Processing → Cancelled`.
/// Terminal states never transition further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed(String),
    Cancelled,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }

    /// Only waiting or failed items may be taken out of the queue by the caller
    pub fn is_removable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One queued unit of enhancement work.
///
/// Status, progress and result are only changed through the transition
/// methods below, which refuse moves the state machine does not allow.
#[derive(Debug, Clone)]
pub struct WorkItem {
    id: Uuid,
    source: SourceRef,
    mode: EnhanceMode,
    format: SupportedFormat,
    status: ItemStatus,
    progress: f64,
    result: Option<Arc<Artifact>>,
    output_path: Option<PathBuf>,
}

impl WorkItem {
    pub fn new(source: SourceRef, mode: EnhanceMode, format: SupportedFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            mode,
            format,
            status: ItemStatus::Pending,
            progress: 0.0,
            result: None,
            output_path: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn mode(&self) -> EnhanceMode {
        self.mode
    }

    pub fn format(&self) -> SupportedFormat {
        self.format
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Present only once the item completed
    pub fn result(&self) -> Option<&Arc<Artifact>> {
        self.result.as_ref()
    }

    pub fn output_path(&self) -> Option<&PathBuf> {
        self.output_path.as_ref()
    }

    pub(crate) fn begin(&mut self) -> bool {
        if self.status != ItemStatus::Pending {
            return false;
        }
        self.status = ItemStatus::Processing;
        self.progress = PROGRESS_STARTED;
        true
    }

    /// Raises progress while processing; never moves it backwards.
    pub(crate) fn advance(&mut self, progress: f64) -> bool {
        if self.status != ItemStatus::Processing {
            return false;
        }
        self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        true
    }

    pub(crate) fn complete(&mut self, artifact: Arc<Artifact>, output_path: PathBuf) -> bool {
        if self.status != ItemStatus::Processing {
            return false;
        }
        self.status = ItemStatus::Completed;
        self.progress = PROGRESS_DONE;
        self.result = Some(artifact);
        self.output_path = Some(output_path);
        true
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.status != ItemStatus::Processing {
            return false;
        }
        self.status = ItemStatus::Failed(reason.into());
        true
    }

    pub(crate) fn cancel(&mut self) -> bool {
        match self.status {
            ItemStatus::Pending | ItemStatus::Processing => {
                self.status = ItemStatus::Cancelled;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    fn pending_item() -> WorkItem {
        WorkItem::new(SourceRef::from("/tmp/a.png"), EnhanceMode::General, SupportedFormat::PNG)
    }

    #[test]
    fn happy_path_transitions() {
        let mut item = pending_item();
        assert!(item.begin());
        assert_eq!(item.progress(), PROGRESS_STARTED);
        assert!(item.advance(PROGRESS_LOADED));
        item.advance(0.05);
        assert_eq!(item.progress(), PROGRESS_LOADED);

        let artifact = Arc::new(Artifact::new(DynamicImage::ImageRgba8(RgbaImage::new(1, 1))));
        assert!(item.complete(artifact, PathBuf::from("/tmp/a_general_4x.png")));
        assert_eq!(item.status(), &ItemStatus::Completed);
        assert_eq!(item.progress(), PROGRESS_DONE);
        assert!(item.result().is_some());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut item = pending_item();
        assert!(item.cancel());
        assert!(!item.begin());
        assert!(!item.fail("late"));
        assert!(!item.cancel());
        assert_eq!(item.status(), &ItemStatus::Cancelled);

        let mut item = pending_item();
        item.begin();
        assert!(item.fail("decoder exploded"));
        assert!(!item.cancel());
        assert!(item.status().is_removable());
    }

    #[test]
    fn cannot_finish_without_processing() {
        let mut item = pending_item();
        assert!(!item.fail("nope"));
        assert_eq!(item.status(), &ItemStatus::Pending);
    }
}
