//! Built-in resampling enhancer.
//!
//! Stands in for a neural upscaler: each mode maps to a resampling filter,
//! and the photo mode adds a light unsharp mask.

use std::io::Cursor;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use crate::core::{EnhanceMode, decode_image};
use crate::processing::Enhancer;
use crate::utils::EnhanceError;

pub const DEFAULT_SCALE: u32 = 4;

/// ISO-BMFF major brands used by HEIC/HEIF files
const HEIF_BRANDS: [&[u8; 4]; 9] = [
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"heif", b"mif1", b"msf1",
];

/// True for an ISO-BMFF container whose major brand is HEIC/HEIF.
fn is_heif(input: &[u8]) -> bool {
    input.len() >= 12 && &input[4..8] == b"ftyp" && HEIF_BRANDS.iter().any(|brand| &input[8..12] == *brand)
}

/// Upscales by a fixed factor with a filter chosen per mode.
#[derive(Debug, Clone, Copy)]
pub struct UpscaleEnhancer {
    scale: u32,
}

impl Default for UpscaleEnhancer {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE)
    }
}

impl UpscaleEnhancer {
    pub fn new(scale: u32) -> Self {
        Self { scale: scale.max(1) }
    }

    fn filter_for(mode: EnhanceMode) -> FilterType {
        match mode {
            EnhanceMode::General => FilterType::CatmullRom,
            EnhanceMode::Anime => FilterType::Triangle,
            EnhanceMode::Photo => FilterType::Lanczos3,
        }
    }

    fn upscale(&self, image: &DynamicImage, mode: EnhanceMode) -> Result<DynamicImage, EnhanceError> {
        let width = image.width().checked_mul(self.scale);
        let height = image.height().checked_mul(self.scale);
        let (Some(width), Some(height)) = (width, height) else {
            return Err(EnhanceError::failed(format!(
                "{}x{} cannot be scaled by {}", image.width(), image.height(), self.scale
            )));
        };

        let resized = image.resize_exact(width, height, Self::filter_for(mode));
        Ok(match mode {
            EnhanceMode::Photo => resized.unsharpen(1.0, 2),
            _ => resized,
        })
    }
}

impl Enhancer for UpscaleEnhancer {
    fn enhance(&self, input: &[u8], mode: EnhanceMode) -> Result<Vec<u8>, EnhanceError> {
        // The queue admits HEIC, but no pure-Rust decoder for it is available here
        if is_heif(input) {
            return Err(EnhanceError::failed("HEIC/HEIF input is not supported by the built-in upscaler"));
        }
        let image = decode_image(input)
            .map_err(|e| EnhanceError::failed(format!("unreadable input: {e}")))?;

        let output = self.upscale(&image, mode)?;

        let mut buffer = Cursor::new(Vec::new());
        output
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| EnhanceError::failed(format!("failed to encode result: {e}")))?;
        Ok(buffer.into_inner())
    }
}
