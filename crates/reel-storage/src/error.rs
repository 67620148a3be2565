//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by an [`ObjectStore`](crate::ObjectStore) backend.
///
/// Variants carry the key or prefix involved so callers can report which
/// asset failed without threading it through separately.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage is not configured: {0}")]
    Config(String),

    #[error("No object at {key}")]
    NotFound { key: String },

    #[error("Reading {key} failed: {reason}")]
    Read { key: String, reason: String },

    #[error("Writing {key} failed: {reason}")]
    Write { key: String, reason: String },

    #[error("Listing {prefix} failed: {reason}")]
    List { prefix: String, reason: String },

    #[error("Signing a URL for {key} failed: {reason}")]
    Presign { key: String, reason: String },

    #[error("Object store unreachable: {0}")]
    Unreachable(String),

    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn read(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Read {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Write {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the object simply does not exist (as opposed to the store failing).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
