use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use image::ImageFormat;
use tracing::debug;
use crate::core::Artifact;

const ENTRY_EXTENSION: &str = "png";
const STAGING_EXTENSION: &str = "tmp";

/// Directory of PNG files named by the blake3 hash of their cache key.
#[derive(Debug, Clone)]
pub(crate) struct DiskTier {
    directory: PathBuf,
}

impl DiskTier {
    /// Opens `directory`, creating it when missing.
    pub fn open(directory: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes());
        self.directory
            .join(format!("{}.{}", digest.to_hex(), ENTRY_EXTENSION))
    }

    /// Reads and decodes the entry for `key`; any failure counts as absent.
    pub fn read(&self, key: &str) -> Option<Artifact> {
        let path = self.entry_path(key);
        let bytes = fs::read(&path).ok()?;
        match Artifact::decode(&bytes) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                debug!("Discarding undecodable cache file {}: {}", path.display(), e);
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Encodes `artifact` as PNG into a staging file unique to `ticket`.
    ///
    /// Nothing is visible to readers until [`DiskTier::commit`] renames it.
    pub fn stage(&self, key: &str, artifact: &Artifact, ticket: u64) -> io::Result<PathBuf> {
        let mut encoded = Cursor::new(Vec::new());
        artifact
            .image()
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(io::Error::other)?;

        let staging = self.entry_path(key).with_extension(format!("{ticket}.{STAGING_EXTENSION}"));
        fs::write(&staging, encoded.into_inner())?;
        Ok(staging)
    }

    /// Moves a staged file into place as the entry for `key`.
    pub fn commit(&self, staging: &Path, key: &str) -> io::Result<()> {
        fs::rename(staging, self.entry_path(key))
    }

    /// Drops a staged file that will never be committed.
    pub fn discard(&self, staging: &Path) {
        if let Err(e) = fs::remove_file(staging) {
            debug!("Could not remove staging file {}: {}", staging.display(), e);
        }
    }

    pub fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.entry_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Deletes every cache entry in the directory, leaving foreign files alone.
    pub fn clear(&self) -> io::Result<usize> {
        let mut removed = 0;
        for path in self.entries()? {
            if fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Total size of the entries on disk in bytes
    pub fn size_bytes(&self) -> u64 {
        self.entries()
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(|path| fs::metadata(path).ok())
                    .map(|meta| meta.len())
                    .sum()
            })
            .unwrap_or(0)
    }

    fn entries(&self) -> io::Result<Vec<PathBuf>> {
        Ok(fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION)
            })
            .collect())
    }
}
