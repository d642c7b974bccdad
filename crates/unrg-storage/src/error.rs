//! Storage error types.

use thiserror::Error;
use unrg_models::{NameError, Namespace};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Messages never carry filesystem paths; callers log those separately.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{namespace} not found: {name}")]
    NotFound { namespace: Namespace, name: String },

    #[error("Invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// The byte source feeding a `put` failed (e.g. a malformed upload).
    #[error("Failed to read upload: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::NotFound {
            namespace,
            name: name.into(),
        }
    }

    pub fn source_failed(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
