//! Error types for the enhancement engine.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.
//! Only [`AdmissionError`] and [`ItemError`] are meant to reach a user; telemetry
//! and cache failures are logged and swallowed where they happen.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use serde::Serialize;

/// Reasons a submitted source is refused before it becomes a work item.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AdmissionError {
    /// The queue already holds its maximum number of items
    #[error("queue is full (max {capacity} items)")]
    QueueFull { capacity: usize },
    /// Extension is not one of the supported image formats
    #[error("unsupported file format .{extension} (supported: {supported})")]
    UnsupportedFormat { extension: String, supported: String },
    /// Source has no extension to derive a format from
    #[error("file has no extension")]
    NoExtension,
    /// The same source is already enqueued
    #[error("already in queue")]
    Duplicate,
    /// One of the header dimensions exceeds the configured maximum
    #[error("image too large ({width}×{height}, limit {limit}×{limit})")]
    Oversize { width: u32, height: u32, limit: u32 },
}

/// Storage access errors for loading sources and writing outputs.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StorageError {
    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// Path exists but is not a file
    #[error("Not a file: {0}")]
    NotFile(PathBuf),
    /// IO error accessing the path
    #[error("IO error: {0}")]
    IO(String),
}

/// Error reported by an enhancer collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EnhanceError {
    /// The enhancement model could not be loaded
    #[error("model not initialized")]
    ModelUnavailable,
    /// The transform itself failed
    #[error("{0}")]
    Failed(String),
}

impl EnhanceError {
    pub fn failed<T: Into<String>>(msg: T) -> Self {
        Self::Failed(msg.into())
    }
}

/// Per-item processing failure.
///
/// The `Display` text is what ends up in `ItemStatus::Failed(reason)`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ItemError {
    #[error("failed to load image: {0}")]
    Load(#[from] StorageError),

    #[error("enhancement failed: {0}")]
    Enhance(#[from] EnhanceError),

    #[error("enhanced output could not be decoded: {0}")]
    Decode(String),

    #[error("failed to encode output: {0}")]
    Encode(String),

    #[error("failed to write output: {0}")]
    Write(String),

    /// The blocking task running the step panicked or was aborted
    #[error("processing task aborted: {0}")]
    Aborted(String),
}

/// Failure to read system memory statistics.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TelemetryError {
    #[error("memory statistics unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for engine setup and configuration.
#[derive(Error, Debug, Serialize)]
pub enum EngineError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File IO error
    #[error("IO error: {0}")]
    IO(String),

    /// Unknown mode or image format name
    #[error("Format error: {0}")]
    Format(String),

    /// Image processing failed outside of a queued item
    #[error("Processing error: {0}")]
    Processing(String),
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// Helper methods for error creation
impl EngineError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn format<T: Into<String>>(msg: T) -> Self {
        Self::Format(msg.into())
    }

    pub fn processing<T: Into<String>>(msg: T) -> Self {
        Self::Processing(msg.into())
    }
}

// Convert std::io::Error to EngineError
impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert io::Error to StorageError
impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}
