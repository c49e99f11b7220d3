//! Index error types

use thiserror::Error;

use crate::models::{ArticleId, SerieId};
use crate::render::RenderError;
use crate::storage::StorageError;

/// Errors returned by the content index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("Article not found: {0}")]
    ArticleNotFound(ArticleId),

    #[error("Series not found: {0}")]
    SerieNotFound(SerieId),

    #[error("Not found: {0}")]
    SlugNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store failure: {0}")]
    Store(StorageError),

    #[error("Render failure: {0}")]
    Render(#[from] RenderError),

    #[error("ID generator failure: {0}")]
    IdGenerator(String),
}

impl IndexError {
    /// Whether the target of the operation does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IndexError::ArticleNotFound(_)
                | IndexError::SerieNotFound(_)
                | IndexError::SlugNotFound(_)
        )
    }

    pub fn is_duplicate_slug(&self) -> bool {
        matches!(self, IndexError::DuplicateSlug(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, IndexError::Validation(_))
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self, IndexError::Store(_))
    }
}

impl From<StorageError> for IndexError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ArticleNotFound(id) => IndexError::ArticleNotFound(id),
            StorageError::SerieNotFound(id) => IndexError::SerieNotFound(id),
            StorageError::SlugTaken(slug) => IndexError::DuplicateSlug(slug),
            other => IndexError::Store(other),
        }
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_taxonomy() {
        let err: IndexError = StorageError::ArticleNotFound(ArticleId(5)).into();
        assert!(err.is_not_found());

        let err: IndexError = StorageError::SlugTaken("a".into()).into();
        assert!(err.is_duplicate_slug());

        let err: IndexError = StorageError::Unavailable("down".into()).into();
        assert!(err.is_store_failure());
        assert_eq!(err.to_string(), "Store failure: Store unavailable: down");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            IndexError::DuplicateSlug("hello".into()).to_string(),
            "Slug already in use: hello"
        );
        assert_eq!(
            IndexError::ArticleNotFound(ArticleId(12)).to_string(),
            "Article not found: 12"
        );
    }
}
