// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Storage error types for the rtsdata storage layer.
//
// One enum covers the byte-level backends and the typed measurement tables:
// I/O errors, serialization failures, corrupted keys or values, unreachable
// backends, and rows that point at reference data which does not exist.

use thiserror::Error;

/// Errors that can occur when interacting with the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred in the underlying storage layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize a value.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The stored data is corrupted or in an unexpected format.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// The storage backend is not available (e.g., file lock held elsewhere).
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A row references a well, tag or label that is not stored.
    #[error("missing reference: {0}")]
    MissingReference(String),
}

impl StorageError {
    /// True when the failure means the backend could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::BackendUnavailable(_) | StorageError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file gone");
        let err = StorageError::Io(io_err);
        assert!(err.to_string().contains("I/O error"));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_corrupted_data_display() {
        let err = StorageError::CorruptedData("short key".to_string());
        assert_eq!(err.to_string(), "corrupted data: short key");
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_backend_unavailable_display() {
        let err = StorageError::BackendUnavailable("lock held".to_string());
        assert!(err.to_string().contains("backend unavailable"));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_missing_reference_display() {
        let err = StorageError::MissingReference("tag 9".to_string());
        assert_eq!(err.to_string(), "missing reference: tag 9");
    }
}
