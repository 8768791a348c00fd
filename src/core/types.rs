//! Core types shared by the queue, cache and history.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use image::{DynamicImage, ImageReader, ImageResult};
use serde::{Deserialize, Serialize};
use crate::utils::{EngineError, canonical_string, extract_filename};

/// Enhancement variant applied to an item, fixed at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhanceMode {
    /// General-purpose Real-ESRGAN style upscaling
    #[default]
    General,
    /// Tuned for line art and flat colours
    Anime,
    /// Tuned for camera photos
    Photo,
}

impl EnhanceMode {
    pub const ALL: [EnhanceMode; 3] = [Self::General, Self::Anime, Self::Photo];

    /// Stable lowercase identifier used in config files, the CLI and cache keys
    pub fn id(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Anime => "anime",
            Self::Photo => "photo",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Anime => "Anime",
            Self::Photo => "Photo",
        }
    }

    /// Tag inserted into output file names
    pub fn filename_suffix(&self) -> &'static str {
        match self {
            Self::General => "_general",
            Self::Anime => "_anime",
            Self::Photo => "_photo",
        }
    }
}

impl fmt::Display for EnhanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EnhanceMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.id() == s)
            .ok_or_else(|| EngineError::format(format!(
                "Unknown enhancement mode: {} (expected general, anime or photo)", s
            )))
    }
}

/// Opaque locator of an input image.
///
/// Equality is on the path exactly as submitted; that is what duplicate
/// detection at admission compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(PathBuf);

impl SourceRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> String {
        extract_filename(&self.0)
    }

    /// Cache key for the artifact produced from this source in `mode`.
    pub fn cache_key(&self, mode: EnhanceMode) -> String {
        format!("{}#{}", canonical_string(&self.0), mode.id())
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for SourceRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for SourceRef {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for SourceRef {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

/// Decodes an encoded image, guessing the container from its magic bytes.
///
/// Runs without the decoder's default allocation ceiling: a 4x output of an
/// admissible source can decode to several gigabytes.
pub fn decode_image(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.no_limits();
    reader.decode()
}

/// A decoded image produced by enhancement.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    image: DynamicImage,
}

impl Artifact {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn decode(bytes: &[u8]) -> ImageResult<Self> {
        decode_image(bytes).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Estimated resident size in bytes (RGBA, 4 bytes per pixel)
    pub fn cost(&self) -> usize {
        self.width() as usize * self.height() as usize * 4
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}
