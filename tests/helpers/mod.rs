//! Test doubles shared by the integration tests
//!
//! - ScriptedEnhancer: canned output, poison-pill failures, delay, call counting
//! - MemoryStorage: in-memory sources and outputs with optional header sizes
//! - ManualMemorySource: memory usage set by the test
//! - TestBed: an Engine wired to the doubles with a throwaway cache dir

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use tempfile::TempDir;
use image_enhancer_lib::core::{EngineConfig, EnhanceMode, ItemStatus, QueueSnapshot, SourceRef};
use image_enhancer_lib::telemetry::{MemorySample, MemorySource};
use image_enhancer_lib::utils::{EnhanceError, StorageError, TelemetryError};
use image_enhancer_lib::{Engine, Enhancer, Storage};

/// Source bytes starting with this make the scripted enhancer fail
pub const POISON: &[u8] = b"POISON";

/// Encodes a solid RGBA image as PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([90, 120, 200, 255])))
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode test png");
    buffer.into_inner()
}

pub struct ScriptedEnhancer {
    output: Vec<u8>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    modes: Mutex<Vec<EnhanceMode>>,
}

impl ScriptedEnhancer {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            output: png_bytes(8, 8),
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `enhance` calls seen
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<EnhanceMode> {
        self.modes.lock().clone()
    }
}

impl Enhancer for ScriptedEnhancer {
    fn enhance(&self, input: &[u8], mode: EnhanceMode) -> Result<Vec<u8>, EnhanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().push(mode);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if input.starts_with(POISON) {
            return Err(EnhanceError::failed("poisoned input"));
        }
        Ok(self.output.clone())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    sources: Mutex<HashMap<PathBuf, Vec<u8>>>,
    dimensions: Mutex<HashMap<PathBuf, (u32, u32)>>,
    written: Mutex<HashMap<PathBuf, Vec<u8>>>,
    denied: Mutex<HashSet<PathBuf>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loadable source and returns its path
    pub fn add(&self, path: &str) -> PathBuf {
        self.add_bytes(path, b"source image bytes".to_vec())
    }

    pub fn add_bytes(&self, path: &str, bytes: Vec<u8>) -> PathBuf {
        let path = PathBuf::from(path);
        self.sources.lock().insert(path.clone(), bytes);
        path
    }

    pub fn add_poisoned(&self, path: &str) -> PathBuf {
        self.add_bytes(path, POISON.to_vec())
    }

    /// Makes `header_dimensions` report a size for `path`
    pub fn set_dimensions(&self, path: &Path, width: u32, height: u32) {
        self.dimensions.lock().insert(path.to_path_buf(), (width, height));
    }

    pub fn deny_write(&self, path: &Path) {
        self.denied.lock().insert(path.to_path_buf());
    }

    pub fn written(&self, path: &Path) -> Option<Vec<u8>> {
        self.written.lock().get(path).cloned()
    }

    pub fn written_count(&self) -> usize {
        self.written.lock().len()
    }
}

impl Storage for MemoryStorage {
    fn load_bytes(&self, source: &SourceRef) -> Result<Vec<u8>, StorageError> {
        self.sources
            .lock()
            .get(source.path())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(source.path().to_path_buf()))
    }

    fn write_bytes(&self, bytes: &[u8], destination: &Path) -> Result<(), StorageError> {
        if self.denied.lock().contains(destination) {
            return Err(StorageError::IO("permission denied".to_string()));
        }
        self.written.lock().insert(destination.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn header_dimensions(&self, source: &SourceRef) -> Option<(u32, u32)> {
        self.dimensions.lock().get(source.path()).copied()
    }
}

/// Reports whatever usage percentage the test last set
pub struct ManualMemorySource {
    usage_percent: Mutex<f64>,
}

impl ManualMemorySource {
    pub fn new(usage_percent: f64) -> Self {
        Self { usage_percent: Mutex::new(usage_percent) }
    }

    pub fn set_usage(&self, usage_percent: f64) {
        *self.usage_percent.lock() = usage_percent;
    }
}

impl MemorySource for ManualMemorySource {
    fn sample(&self) -> Result<MemorySample, TelemetryError> {
        let total_bytes = 8 * 1024 * 1024 * 1024u64;
        let used_bytes = (total_bytes as f64 * *self.usage_percent.lock() / 100.0) as u64;
        Ok(MemorySample {
            total_bytes,
            used_bytes,
            available_bytes: total_bytes - used_bytes,
        })
    }
}

pub struct TestBed {
    pub engine: Engine,
    pub enhancer: Arc<ScriptedEnhancer>,
    pub storage: Arc<MemoryStorage>,
    pub memory: Arc<ManualMemorySource>,
    pub cache_dir: TempDir,
}

impl TestBed {
    pub fn new() -> Self {
        Self::build(ScriptedEnhancer::new(), |_| {})
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::build(ScriptedEnhancer::with_delay(delay), |_| {})
    }

    pub fn build(enhancer: ScriptedEnhancer, configure: impl FnOnce(&mut EngineConfig)) -> Self {
        let cache_dir = tempfile::tempdir().expect("create cache dir");
        let mut config = EngineConfig::default();
        config.cache.directory = Some(cache_dir.path().to_path_buf());
        configure(&mut config);

        let enhancer = Arc::new(enhancer);
        let storage = Arc::new(MemoryStorage::new());
        let memory = Arc::new(ManualMemorySource::new(40.0));
        let engine = Engine::new(config, enhancer.clone(), storage.clone(), memory.clone())
            .expect("engine from valid config");

        Self { engine, enhancer, storage, memory, cache_dir }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.engine.queue().snapshot()
    }

    pub fn status_of(&self, id: uuid::Uuid) -> ItemStatus {
        self.engine
            .queue()
            .item(id)
            .map(|item| item.status)
            .expect("item present")
    }
}

/// Polls `check` until it holds, failing the test after five seconds.
pub async fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Runs the queue to idle, failing the test after five seconds.
pub async fn run_to_idle(bed: &TestBed) {
    tokio::time::timeout(Duration::from_secs(5), bed.engine.queue().wait_until_idle())
        .await
        .expect("queue did not go idle");
}
