pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{
    AdmissionError,
    EngineError,
    EngineResult,
    EnhanceError,
    ItemError,
    StorageError,
    TelemetryError,
};
pub use validation::{check_capacity, check_dimensions};
pub use formats::{SupportedFormat, OutputEncoding, DEFAULT_LOSSY_QUALITY, format_from_extension};
pub use fs::{extract_filename, get_extension, canonical_string, output_path_for};
