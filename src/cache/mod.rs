//! Two-tier artifact cache.
//!
//! The fast tier is an in-memory LRU bounded by item count and estimated
//! byte cost. Every insert is also written to a disk tier in the background;
//! a fast-tier miss falls through to disk and promotes what it finds.
//! Cache failures never reach callers: they degrade to a miss or a no-op.

mod disk;
mod memory;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::core::{Artifact, CacheConfig};
use disk::DiskTier;
use memory::MemoryTier;

/// Occupancy figures for display and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub memory_items: usize,
    pub memory_cost: usize,
    pub disk_bytes: u64,
}

/// Keys with a disk write in flight, mapped to the ticket of the newest one.
///
/// A write commits only while its ticket is still the one recorded here, and
/// the check and rename happen under this lock. `remove` and `clear_all`
/// withdraw tickets under the same lock, so a write queued before them can
/// never land after them.
type WriteTickets = Arc<Mutex<HashMap<String, u64>>>;

pub struct ArtifactCache {
    memory: Mutex<MemoryTier>,
    disk: Option<Arc<DiskTier>>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
    tickets: WriteTickets,
    next_ticket: AtomicU64,
}

impl ArtifactCache {
    /// Builds a cache from config.
    ///
    /// When the disk directory cannot be created the cache runs memory-only.
    pub fn new(config: &CacheConfig) -> Self {
        let directory = config.resolved_directory();
        let disk = match DiskTier::open(directory.clone()) {
            Ok(tier) => {
                debug!("Artifact disk cache at {}", directory.display());
                Some(Arc::new(tier))
            }
            Err(e) => {
                warn!("Disk cache unavailable at {}: {}", directory.display(), e);
                None
            }
        };
        Self::with_tiers(config, disk)
    }

    /// A cache without a disk tier
    pub fn memory_only(config: &CacheConfig) -> Self {
        Self::with_tiers(config, None)
    }

    fn with_tiers(config: &CacheConfig, disk: Option<Arc<DiskTier>>) -> Self {
        Self {
            memory: Mutex::new(MemoryTier::new(config.max_items, config.max_bytes)),
            disk,
            pending_writes: Mutex::new(Vec::new()),
            tickets: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn disk_directory(&self) -> Option<&Path> {
        self.disk.as_deref().map(DiskTier::directory)
    }

    /// Stores `artifact` in the fast tier and schedules a disk write.
    pub fn set(&self, key: &str, artifact: Arc<Artifact>) {
        let cost = artifact.cost();
        let evicted = self.memory.lock().insert(key, artifact.clone(), cost);
        for old in &evicted {
            debug!("Cache evicted {}", old);
        }
        self.schedule_write(key, artifact);
    }

    fn schedule_write(&self, key: &str, artifact: Arc<Artifact>) {
        let Some(disk) = self.disk.clone() else { return };
        let key = key.to_string();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.tickets.lock().insert(key.clone(), ticket);
        let tickets = self.tickets.clone();

        let write = move || {
            let staging = match disk.stage(&key, &artifact, ticket) {
                Ok(staging) => staging,
                Err(e) => {
                    debug!("Disk cache write failed for {}: {}", key, e);
                    let mut tickets = tickets.lock();
                    if tickets.get(&key) == Some(&ticket) {
                        tickets.remove(&key);
                    }
                    return;
                }
            };

            let mut tickets = tickets.lock();
            if tickets.get(&key) != Some(&ticket) {
                debug!("Dropping superseded disk write for {}", key);
                disk.discard(&staging);
                return;
            }
            tickets.remove(&key);
            if let Err(e) = disk.commit(&staging, &key) {
                debug!("Disk cache write failed for {}: {}", key, e);
                disk.discard(&staging);
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                let mut pending = self.pending_writes.lock();
                pending.retain(|task| !task.is_finished());
                pending.push(handle.spawn_blocking(write));
            }
            Err(_) => {
                std::thread::spawn(write);
            }
        }
    }

    /// Looks up `key` in the fast tier, then on disk.
    ///
    /// A disk hit is promoted into the fast tier before returning. This may
    /// touch the filesystem, so async callers should run it off the runtime.
    pub fn get(&self, key: &str) -> Option<Arc<Artifact>> {
        if let Some(artifact) = self.memory.lock().get(key) {
            debug!("Cache hit (memory): {}", key);
            return Some(artifact);
        }

        let artifact = Arc::new(self.disk.as_ref()?.read(key)?);
        debug!("Cache hit (disk): {}", key);
        let cost = artifact.cost();
        self.memory.lock().insert(key, artifact.clone(), cost);
        Some(artifact)
    }

    /// True when `key` is resident in the fast tier
    pub fn is_resident(&self, key: &str) -> bool {
        self.memory.lock().contains(key)
    }

    pub fn remove(&self, key: &str) {
        self.memory.lock().remove(key);
        if let Some(disk) = &self.disk {
            let mut tickets = self.tickets.lock();
            tickets.remove(key);
            if let Err(e) = disk.remove(key) {
                debug!("Disk cache remove failed for {}: {}", key, e);
            }
        }
    }

    pub fn clear_all(&self) {
        self.memory.lock().clear();
        if let Some(disk) = &self.disk {
            let mut tickets = self.tickets.lock();
            tickets.clear();
            match disk.clear() {
                Ok(removed) => debug!("Removed {} disk cache entries", removed),
                Err(e) => debug!("Disk cache clear failed: {}", e),
            }
        }
        info!("Artifact cache cleared");
    }

    /// Drops the whole fast tier in response to a low-memory signal.
    ///
    /// The disk tier is kept so evicted artifacts can still be promoted later.
    pub fn purge_memory(&self) {
        let mut memory = self.memory.lock();
        let (items, cost) = (memory.len(), memory.total_cost());
        memory.clear();
        warn!("Memory warning: flushed {} cached artifacts ({} bytes)", items, cost);
    }

    pub fn stats(&self) -> CacheStats {
        let (memory_items, memory_cost) = {
            let memory = self.memory.lock();
            (memory.len(), memory.total_cost())
        };
        CacheStats {
            memory_items,
            memory_cost,
            disk_bytes: self.disk.as_ref().map_or(0, |disk| disk.size_bytes()),
        }
    }

    /// Waits for every disk write scheduled so far to finish.
    pub async fn flush_pending_writes(&self) {
        let pending: Vec<_> = std::mem::take(&mut *self.pending_writes.lock());
        for task in pending {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn artifact(side: u32, shade: u8) -> Arc<Artifact> {
        Arc::new(Artifact::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            side,
            side,
            Rgba([shade, shade, shade, 255]),
        ))))
    }

    fn config(dir: &Path, max_items: usize, max_bytes: usize) -> CacheConfig {
        CacheConfig {
            max_items,
            max_bytes,
            directory: Some(dir.to_path_buf()),
        }
    }

    #[tokio::test]
    async fn get_after_set_hits_before_disk_write() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(&config(dir.path(), 10, 1 << 20));
        let value = artifact(4, 7);

        cache.set("k", value.clone());
        assert_eq!(cache.get("k"), Some(value));
        cache.flush_pending_writes().await;
    }

    #[tokio::test]
    async fn evicted_entry_is_promoted_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(&config(dir.path(), 2, 1 << 20));
        cache.set("a", artifact(2, 1));
        cache.set("b", artifact(2, 2));
        cache.set("c", artifact(2, 3));
        cache.flush_pending_writes().await;

        assert!(!cache.is_resident("a"));
        assert_eq!(cache.get("a"), Some(artifact(2, 1)));
        assert!(cache.is_resident("a"));
        assert_eq!(cache.stats().memory_items, 2);
    }

    #[tokio::test]
    async fn purge_keeps_disk_tier() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(&config(dir.path(), 10, 1 << 20));
        cache.set("k", artifact(3, 9));
        cache.flush_pending_writes().await;

        cache.purge_memory();
        let stats = cache.stats();
        assert_eq!(stats.memory_items, 0);
        assert_eq!(stats.memory_cost, 0);
        assert!(stats.disk_bytes > 0);
        assert_eq!(cache.get("k"), Some(artifact(3, 9)));
    }

    #[tokio::test]
    async fn remove_and_clear_cover_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(&config(dir.path(), 10, 1 << 20));
        cache.set("a", artifact(2, 1));
        cache.set("b", artifact(2, 2));
        cache.flush_pending_writes().await;

        cache.remove("a");
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());

        cache.clear_all();
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn oversized_artifact_goes_to_disk_only() {
        let dir = tempfile::tempdir().unwrap();
        // 8×8 RGBA costs 256 bytes
        let cache = ArtifactCache::new(&config(dir.path(), 10, 100));
        cache.set("big", artifact(8, 5));
        assert!(!cache.is_resident("big"));
        cache.flush_pending_writes().await;
        assert!(cache.stats().disk_bytes > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn removed_entry_stays_removed_after_queued_write() {
        for round in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let cache = ArtifactCache::new(&config(dir.path(), 10, 1 << 20));
            cache.set("k", artifact(16, round));
            cache.remove("k");
            cache.flush_pending_writes().await;

            assert_eq!(cache.get("k"), None, "round {round}");
            assert!(!cache.is_resident("k"));
            // Superseded writes leave no staging files behind
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cleared_cache_stays_empty_after_queued_writes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(&config(dir.path(), 10, 1 << 20));
        cache.set("a", artifact(16, 1));
        cache.set("b", artifact(16, 2));
        cache.clear_all();
        cache.flush_pending_writes().await;

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.stats(), CacheStats::default());

        // A set after the clear is kept
        cache.set("c", artifact(2, 3));
        cache.flush_pending_writes().await;
        cache.purge_memory();
        assert_eq!(cache.get("c"), Some(artifact(2, 3)));
    }

    #[tokio::test]
    async fn newer_write_wins_over_older_one() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(&config(dir.path(), 10, 1 << 20));
        cache.set("k", artifact(2, 1));
        cache.set("k", artifact(2, 2));
        cache.flush_pending_writes().await;

        cache.purge_memory();
        assert_eq!(cache.get("k"), Some(artifact(2, 2)));
    }

    #[test]
    fn memory_only_cache_misses_after_eviction() {
        let cache = ArtifactCache::memory_only(&CacheConfig {
            max_items: 1,
            ..CacheConfig::default()
        });
        cache.set("a", artifact(1, 1));
        cache.set("b", artifact(1, 2));
        assert_eq!(cache.get("a"), None);
        assert!(cache.disk_directory().is_none());
    }
}
