//! Storage error handling
//!
//! Typed errors for Article Store operations with descriptive messages.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{ArticleId, SerieId};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// No stored article has this id
    #[error("Article {0} not found in store")]
    ArticleNotFound(ArticleId),

    /// No stored series has this id
    #[error("Series {0} not found in store")]
    SerieNotFound(SerieId),

    /// Another stored article already uses this slug
    #[error("Slug '{0}' is already taken in store")]
    SlugTaken(String),

    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored timestamp is out of range
    #[error("Invalid timestamp {value} in column '{column}'")]
    InvalidTimestamp { column: &'static str, value: i64 },

    /// The backend refused the operation (used by in-process stores)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Whether the error reports a missing record rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ArticleNotFound(_) | StorageError::SerieNotFound(_)
        )
    }

    /// Whether the error is a uniqueness violation (e.g. a reused slug)
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StorageError::SlugTaken(_) => true,
            StorageError::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(StorageError::ArticleNotFound(ArticleId(3)).is_not_found());
        assert!(StorageError::SerieNotFound(SerieId(3)).is_not_found());
        assert!(!StorageError::Unavailable("down".into()).is_not_found());
        assert!(StorageError::SlugTaken("about".into()).is_constraint_violation());
        assert!(!StorageError::Unavailable("down".into()).is_constraint_violation());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::ArticleNotFound(ArticleId(12));
        assert!(err.to_string().contains("12"));

        let err = StorageError::InvalidTimestamp {
            column: "created_at",
            value: i64::MAX,
        };
        let msg = err.to_string();
        assert!(msg.contains("created_at"));
    }

    #[test]
    fn test_create_directory_display() {
        let err = StorageError::CreateDirectory {
            path: PathBuf::from("/data/quill"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/data/quill"));
    }
}
