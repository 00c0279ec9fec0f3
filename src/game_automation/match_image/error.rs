use std::path::PathBuf;
use thiserror::Error;

pub type MatchResult<T> = Result<T, MatchError>;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Template directory not found: {path:?}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read template directory: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to load template {path:?}: {source}")]
    Load {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Template crop region {region} exceeds image bounds ({width}x{height})")]
    CropOutOfBounds {
        region: String,
        width: u32,
        height: u32,
    },

    #[error("Text recognition is not available with this match service")]
    TextRecognitionUnavailable,
}
