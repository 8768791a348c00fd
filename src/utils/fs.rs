use std::path::{Path, PathBuf};
use crate::core::EnhanceMode;
use crate::utils::SupportedFormat;

/// Marker appended to every enhanced output name.
const SCALE_TAG: &str = "_4x";

/// Last path component as a display string
pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Get file extension as lowercase string
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Canonical string form of a path, falling back to the path as given
/// when it cannot be resolved (missing file, permissions).
pub fn canonical_string(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

/// Sibling output path for an enhanced image: `{stem}{suffix}_4x.{ext}`.
///
/// JPEG sources keep their own extension, other lossy sources become `.jpg`
/// and lossless sources become `.png`.
pub fn output_path_for(source: &Path, mode: EnhanceMode, format: SupportedFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let ext = if format.is_lossless() {
        "png".to_string()
    } else if format == SupportedFormat::JPEG {
        get_extension(source).unwrap_or_else(|| "jpg".to_string())
    } else {
        "jpg".to_string()
    };

    let parent = source.parent().unwrap_or(Path::new(""));
    parent.join(format!("{stem}{}{SCALE_TAG}.{ext}", mode.filename_suffix()))
}
