//! In-process Article Store
//!
//! Keeps everything in ordered maps. Useful for tests and for running the
//! index without a database; `set_unavailable` makes every write fail so the
//! all-or-nothing behaviour of the index can be exercised.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::error::{StorageError, StorageResult};
use super::{AdminPage, AdminQuery, ArticleStore, Shelf};
use crate::models::{newest_first, Article, ArticleId, Derived, Serie, SerieId};

#[derive(Debug, Default)]
struct Tables {
    articles: BTreeMap<ArticleId, Article>,
    series: BTreeMap<SerieId, Serie>,
    /// Largest id ever inserted, removed rows included
    high_water: Option<i64>,
}

impl Tables {
    fn record_id(&mut self, id: i64) {
        self.high_water = self.high_water.max(Some(id));
    }
}

/// Article Store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with articles and series
    pub fn with_data(articles: Vec<Article>, series: Vec<Serie>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.lock();
            for mut article in articles {
                article.derived = Derived::default();
                tables.record_id(article.id.0);
                tables.articles.insert(article.id, article);
            }
            for serie in series {
                tables.record_id(serie.id.0);
                tables.series.insert(serie.id, serie);
            }
        }
        store
    }

    /// Make every write fail with `StorageError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored articles in any state
    pub fn article_count(&self) -> usize {
        self.tables.lock().articles.len()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store is read-only".into()));
        }
        Ok(())
    }

    fn collect_sorted(&self, keep: impl Fn(&Article) -> bool) -> Vec<Article> {
        let tables = self.tables.lock();
        let mut articles: Vec<Article> = tables
            .articles
            .values()
            .filter(|a| keep(*a))
            .cloned()
            .collect();
        articles.sort_by(newest_first);
        articles
    }
}

impl ArticleStore for MemoryStore {
    fn fetch_published(&self) -> StorageResult<Vec<Article>> {
        Ok(self.collect_sorted(Article::is_published))
    }

    fn fetch(&self, id: ArticleId) -> StorageResult<Option<Article>> {
        Ok(self.tables.lock().articles.get(&id).cloned())
    }

    fn insert(&self, article: &Article) -> StorageResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        if tables.articles.values().any(|a| a.slug == article.slug) {
            return Err(StorageError::SlugTaken(article.slug.clone()));
        }
        let mut stored = article.clone();
        stored.derived = Derived::default();
        tables.record_id(stored.id.0);
        tables.articles.insert(stored.id, stored);
        Ok(())
    }

    fn update(&self, article: &Article) -> StorageResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        if !tables.articles.contains_key(&article.id) {
            return Err(StorageError::ArticleNotFound(article.id));
        }
        if tables
            .articles
            .values()
            .any(|a| a.slug == article.slug && a.id != article.id)
        {
            return Err(StorageError::SlugTaken(article.slug.clone()));
        }
        let mut stored = article.clone();
        stored.derived = Derived::default();
        tables.articles.insert(stored.id, stored);
        Ok(())
    }

    fn mark_deleted(&self, id: ArticleId, at: DateTime<Utc>) -> StorageResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        let article = tables
            .articles
            .get_mut(&id)
            .ok_or(StorageError::ArticleNotFound(id))?;
        article.deleted_at = Some(at);
        Ok(())
    }

    fn recover(&self, id: ArticleId) -> StorageResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        let article = tables
            .articles
            .get_mut(&id)
            .ok_or(StorageError::ArticleNotFound(id))?;
        article.deleted_at = None;
        article.is_draft = true;
        Ok(())
    }

    fn delete(&self, id: ArticleId) -> StorageResult<()> {
        self.check_writable()?;
        self.tables
            .lock()
            .articles
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::ArticleNotFound(id))
    }

    fn fetch_draft_or_trash(&self, shelf: Shelf) -> StorageResult<Vec<Article>> {
        Ok(match shelf {
            Shelf::Drafts => self.collect_sorted(|a| a.is_draft && !a.is_deleted()),
            Shelf::Trash => self.collect_sorted(Article::is_deleted),
        })
    }

    fn list_admin(&self, query: &AdminQuery) -> StorageResult<AdminPage> {
        let matching = self.collect_sorted(|a| query.matches(a));
        let total_pages = query.total_pages(matching.len());
        let articles = matching
            .into_iter()
            .skip(query.offset())
            .take(query.page_size)
            .collect();
        Ok(AdminPage {
            total_pages,
            articles,
        })
    }

    fn purge_trash(&self, older_than: DateTime<Utc>) -> StorageResult<usize> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        let before = tables.articles.len();
        tables
            .articles
            .retain(|_, a| !matches!(a.deleted_at, Some(at) if at < older_than));
        Ok(before - tables.articles.len())
    }

    fn max_id(&self) -> StorageResult<Option<i64>> {
        Ok(self.tables.lock().high_water)
    }

    fn fetch_series(&self) -> StorageResult<Vec<Serie>> {
        Ok(self.tables.lock().series.values().rev().cloned().collect())
    }

    fn insert_serie(&self, serie: &Serie) -> StorageResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        tables.record_id(serie.id.0);
        tables.series.insert(serie.id, serie.clone());
        Ok(())
    }

    fn update_serie(&self, serie: &Serie) -> StorageResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        let stored = tables
            .series
            .get_mut(&serie.id)
            .ok_or(StorageError::SerieNotFound(serie.id))?;
        *stored = serie.clone();
        Ok(())
    }

    fn delete_serie(&self, id: SerieId) -> StorageResult<()> {
        self.check_writable()?;
        self.tables
            .lock()
            .series
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::SerieNotFound(id))
    }
}
