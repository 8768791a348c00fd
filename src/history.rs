//! Undo/redo history of produced artifacts and the recent-files list.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;
use crate::core::{Artifact, EnhanceMode, SourceRef};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub artifact: Arc<Artifact>,
    pub mode: EnhanceMode,
    pub created_at: SystemTime,
}

/// Bounded undo/redo stack with branch truncation.
///
/// `cursor` indexes the current entry and is `None` only while empty.
#[derive(Debug)]
pub struct HistoryStack {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    limit: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryStack {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            cursor: None,
            limit: limit.max(1),
        }
    }

    /// Records a new current entry, discarding anything ahead of the cursor.
    pub fn push(&mut self, artifact: Arc<Artifact>, mode: EnhanceMode) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }

        self.entries.push_back(HistoryEntry {
            artifact,
            mode,
            created_at: SystemTime::now(),
        });

        if self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
        debug!("History: {} entries, cursor at {}", self.entries.len(), self.entries.len() - 1);
    }

    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        let cursor = self.cursor.filter(|&c| c > 0)? - 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        let cursor = self.cursor.filter(|&c| c + 1 < self.entries.len())? + 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    /// Entry under the cursor
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor?)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Most-recent-first list of processed sources, without duplicates.
#[derive(Debug, Clone)]
pub struct RecentFiles {
    sources: VecDeque<SourceRef>,
    limit: usize,
}

impl Default for RecentFiles {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_LIMIT)
    }
}

impl RecentFiles {
    pub fn new(limit: usize) -> Self {
        Self {
            sources: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn record(&mut self, source: SourceRef) {
        self.sources.retain(|existing| existing != &source);
        self.sources.push_front(source);
        self.sources.truncate(self.limit);
    }

    pub fn list(&self) -> Vec<SourceRef> {
        self.sources.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}
