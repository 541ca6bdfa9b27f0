use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlossError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Corrupt snapshot for {key}: {reason}")]
    CorruptSnapshot { key: String, reason: String },
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Upload error: {0}")]
    UploadError(String),
}

impl From<rusqlite::Error> for GlossError {
    fn from(e: rusqlite::Error) -> Self {
        GlossError::StorageUnavailable(e.to_string())
    }
}

impl GlossError {
    /// True for failures that leave the store untouched and are worth retrying later.
    pub fn is_storage(&self) -> bool {
        matches!(self, GlossError::StorageUnavailable(_))
    }
}
