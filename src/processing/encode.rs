//! Output encoders for enhanced artifacts.

use std::io::Cursor;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use crate::core::Artifact;
use crate::utils::{ItemError, OutputEncoding};

/// Encodes `artifact` for writing next to its source.
///
/// JPEG has no alpha channel, so lossy outputs are flattened to RGB first.
pub fn encode_artifact(artifact: &Artifact, encoding: OutputEncoding) -> Result<Vec<u8>, ItemError> {
    match encoding {
        OutputEncoding::Jpeg { quality } => encode_jpeg(artifact, quality),
        OutputEncoding::Png => encode_png(artifact),
    }
}

fn encode_jpeg(artifact: &Artifact, quality: u8) -> Result<Vec<u8>, ItemError> {
    let rgb = artifact.image().to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| ItemError::Encode(format!("JPEG: {e}")))?;
    Ok(buffer)
}

fn encode_png(artifact: &Artifact) -> Result<Vec<u8>, ItemError> {
    let mut buffer = Cursor::new(Vec::new());
    artifact
        .image()
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ItemError::Encode(format!("PNG: {e}")))?;
    Ok(buffer.into_inner())
}
