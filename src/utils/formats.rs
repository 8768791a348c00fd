use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use crate::utils::{AdmissionError, EngineError};

/// Quality used whenever an output is re-encoded to a lossy format.
pub const DEFAULT_LOSSY_QUALITY: u8 = 85;

/// Input formats accepted for enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedFormat {
    JPEG,
    PNG,
    HEIC,
    BMP,
    TIFF,
    WebP,
}

/// Encoding chosen for an enhanced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    /// Lossy JPEG at a fixed quality
    Jpeg { quality: u8 },
    /// Lossless PNG
    Png,
}

impl SupportedFormat {
    pub const ALL: [SupportedFormat; 6] = [
        Self::JPEG,
        Self::PNG,
        Self::HEIC,
        Self::BMP,
        Self::TIFF,
        Self::WebP,
    ];

    /// Get file extensions associated with this format
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::JPEG => &["jpg", "jpeg"],
            Self::PNG => &["png"],
            Self::HEIC => &["heic", "heif"],
            Self::BMP => &["bmp"],
            Self::TIFF => &["tiff", "tif"],
            Self::WebP => &["webp"],
        }
    }

    /// Check if the extension matches this format
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.extensions().contains(&ext.as_str())
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::JPEG => "JPEG",
            Self::PNG => "PNG",
            Self::HEIC => "HEIC",
            Self::BMP => "BMP",
            Self::TIFF => "TIFF",
            Self::WebP => "WebP",
        }
    }

    /// Whether the source format stores pixels without loss.
    ///
    /// Lossless sources are written back as PNG, lossy ones as JPEG.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::PNG | Self::HEIC | Self::BMP | Self::TIFF)
    }

    /// Encoding for an enhanced image produced from a source of this format.
    pub fn output_encoding(&self, lossy_quality: u8) -> OutputEncoding {
        if self.is_lossless() {
            OutputEncoding::Png
        } else {
            OutputEncoding::Jpeg { quality: lossy_quality }
        }
    }

    /// Comma separated list of format names for user-facing messages.
    pub fn supported_formats_string() -> String {
        Self::ALL
            .iter()
            .map(|f| f.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for SupportedFormat {
    type Err = EngineError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.matches_extension(ext))
            .ok_or_else(|| EngineError::format(format!("Unsupported image format: {}", ext)))
    }
}

/// Get format from file extension, as an admission decision.
pub fn format_from_extension(path: &Path) -> Result<SupportedFormat, AdmissionError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or(AdmissionError::NoExtension)?;

    SupportedFormat::from_str(ext).map_err(|_| AdmissionError::UnsupportedFormat {
        extension: ext.to_lowercase(),
        supported: SupportedFormat::supported_formats_string(),
    })
}
