//! Storage layer
//!
//! The Article Store is the durable side of Quill. The in-memory index is
//! rebuilt from it on startup and every mutation is written here first.
//!
//! ## Backends
//!
//! - **SQLite** (`SqliteStore`): the default, file-backed store
//! - **Memory** (`MemoryStore`): in-process store for tests and throwaway runs

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Article, ArticleId, Serie, SerieId};

/// Which non-published shelf to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shelf {
    /// Drafts that are not in the trash
    Drafts,
    /// Soft-deleted articles
    Trash,
}

/// Filters for the admin article listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminQuery {
    /// Only published articles of this series
    pub serie_id: Option<SerieId>,
    /// Case-insensitive title filter for published articles
    pub keyword: Option<String>,
    /// List drafts instead of published articles
    pub draft: bool,
    /// List the trash instead of published articles (ignored when `draft`)
    pub trash: bool,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
}

impl Default for AdminQuery {
    fn default() -> Self {
        Self {
            serie_id: None,
            keyword: None,
            draft: false,
            trash: false,
            page: 1,
            page_size: 20,
        }
    }
}

impl AdminQuery {
    /// Whether an article passes the filters (ignoring paging)
    pub fn matches(&self, article: &Article) -> bool {
        if self.draft {
            return article.is_draft && !article.is_deleted();
        }
        if self.trash {
            return article.is_deleted();
        }
        if !article.is_published() {
            return false;
        }
        if let Some(serie_id) = self.serie_id {
            if article.serie_id != Some(serie_id) {
                return false;
            }
        }
        match self.keyword.as_deref() {
            Some(kw) if !kw.is_empty() => article
                .title
                .to_lowercase()
                .contains(&kw.to_lowercase()),
            _ => true,
        }
    }

    /// Row offset of the requested page
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1) * self.page_size
    }

    /// Number of pages needed for `count` rows
    pub fn total_pages(&self, count: usize) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        count.div_ceil(self.page_size)
    }
}

/// One page of the admin listing
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AdminPage {
    pub total_pages: usize,
    pub articles: Vec<Article>,
}

/// Durable article and series storage
///
/// Implementations must be safe to share across threads; the index holds the
/// store behind an `Arc` and the trash sweeper calls it from a background task.
pub trait ArticleStore: Send + Sync {
    /// All non-draft, non-deleted articles (bootstrap)
    fn fetch_published(&self) -> StorageResult<Vec<Article>>;

    /// A single article in any state
    fn fetch(&self, id: ArticleId) -> StorageResult<Option<Article>>;

    /// Insert a new article; the slug must be unused
    fn insert(&self, article: &Article) -> StorageResult<()>;

    /// Overwrite the stored fields of an existing article
    fn update(&self, article: &Article) -> StorageResult<()>;

    /// Move an article to the trash
    fn mark_deleted(&self, id: ArticleId, at: DateTime<Utc>) -> StorageResult<()>;

    /// Take an article out of the trash, back to draft
    fn recover(&self, id: ArticleId) -> StorageResult<()>;

    /// Permanently delete an article
    fn delete(&self, id: ArticleId) -> StorageResult<()>;

    /// Drafts or trash, newest first
    fn fetch_draft_or_trash(&self, shelf: Shelf) -> StorageResult<Vec<Article>>;

    /// Filtered, paginated listing for the admin screens
    fn list_admin(&self, query: &AdminQuery) -> StorageResult<AdminPage>;

    /// Permanently delete trashed articles deleted before `older_than`
    fn purge_trash(&self, older_than: DateTime<Utc>) -> StorageResult<usize>;

    /// Largest article or series id ever stored
    fn max_id(&self) -> StorageResult<Option<i64>>;

    /// All series
    fn fetch_series(&self) -> StorageResult<Vec<Serie>>;

    fn insert_serie(&self, serie: &Serie) -> StorageResult<()>;

    fn update_serie(&self, serie: &Serie) -> StorageResult<()>;

    fn delete_serie(&self, id: SerieId) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_query_paging() {
        let query = AdminQuery {
            page: 3,
            page_size: 10,
            ..AdminQuery::default()
        };
        assert_eq!(query.offset(), 20);
        assert_eq!(query.total_pages(0), 0);
        assert_eq!(query.total_pages(10), 1);
        assert_eq!(query.total_pages(21), 3);

        let zeroth = AdminQuery {
            page: 0,
            ..AdminQuery::default()
        };
        assert_eq!(zeroth.offset(), 0);
    }

    #[test]
    fn test_admin_query_matches() {
        let mut article = Article::with_id(ArticleId(1), "rust", "Learning Rust");
        article.serie_id = Some(SerieId(9));

        let mut query = AdminQuery::default();
        assert!(query.matches(&article));

        query.keyword = Some("rust".into());
        assert!(query.matches(&article));

        query.serie_id = Some(SerieId(8));
        assert!(!query.matches(&article));

        let drafts = AdminQuery {
            draft: true,
            ..AdminQuery::default()
        };
        assert!(!drafts.matches(&article));
        article.is_draft = true;
        assert!(drafts.matches(&article));

        let trash = AdminQuery {
            trash: true,
            ..AdminQuery::default()
        };
        assert!(!trash.matches(&article));
        article.deleted_at = Some(Utc::now());
        assert!(trash.matches(&article));
        assert!(!drafts.matches(&article));
    }
}
