//! Typed error variants for the storage layer.
//!
//! Callers of [`crate::KeyValueStore`] almost always swallow these (a failed
//! read means "use the default", a failed write means "keep the in-memory
//! value for this session"), but the variants stay distinct so the log line
//! says what actually went wrong.

use thiserror::Error;

/// Errors produced by a [`crate::KeyValueStore`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a flat JSON object of strings.
    #[error("storage file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend refuses writes (quota exceeded, storage disabled).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
