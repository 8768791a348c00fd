use std::fs;
use std::path::Path;
use image::ImageReader;
use tracing::debug;
use crate::core::SourceRef;
use crate::processing::Storage;
use crate::utils::StorageError;

/// Reads sources from and writes outputs to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }

    fn validate_input_path(path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(StorageError::NotFile(path.to_path_buf()));
        }
        Ok(())
    }

    fn validate_output_path(path: &Path) -> Result<(), StorageError> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                Err(StorageError::NotFound(parent.to_path_buf()))
            }
            _ => Ok(()),
        }
    }
}

impl Storage for FsStorage {
    fn load_bytes(&self, source: &SourceRef) -> Result<Vec<u8>, StorageError> {
        Self::validate_input_path(source.path())?;
        Ok(fs::read(source.path())?)
    }

    fn write_bytes(&self, bytes: &[u8], destination: &Path) -> Result<(), StorageError> {
        Self::validate_output_path(destination)?;
        fs::write(destination, bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), destination.display());
        Ok(())
    }

    /// Reads only the image header; formats the decoder cannot sniff yield `None`.
    fn header_dimensions(&self, source: &SourceRef) -> Option<(u32, u32)> {
        ImageReader::open(source.path())
            .ok()?
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }
}
