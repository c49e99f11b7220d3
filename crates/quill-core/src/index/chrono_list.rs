//! Chronological list and slug lookup
//!
//! The id-keyed table here is the only owner of article data. Every other
//! structure in the index refers to articles by `ArticleId`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{IndexError, IndexResult};
use crate::models::{newest_first, Article, ArticleId};

/// Published articles, newest first
#[derive(Debug, Clone, Default)]
pub struct ChronoList {
    order: Vec<ArticleId>,
    table: HashMap<ArticleId, Arc<Article>>,
    slugs: HashMap<String, ArticleId>,
}

impl ChronoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert in sorted position
    ///
    /// An entry with the same id is replaced. Fails if another article
    /// already uses the slug.
    pub fn insert(&mut self, article: Arc<Article>) -> IndexResult<usize> {
        self.check_slug(&article)?;
        self.remove(article.id);

        let pos = self.insertion_point(&article);
        self.order.insert(pos, article.id);
        self.slugs.insert(article.slug.clone(), article.id);
        self.table.insert(article.id, article);
        Ok(pos)
    }

    /// Append without keeping order; call `sort` once all entries are in
    pub fn push_unsorted(&mut self, article: Arc<Article>) -> IndexResult<()> {
        self.check_slug(&article)?;
        if self.table.contains_key(&article.id) {
            self.remove(article.id);
        }
        self.order.push(article.id);
        self.slugs.insert(article.slug.clone(), article.id);
        self.table.insert(article.id, article);
        Ok(())
    }

    pub fn sort(&mut self) {
        let table = &self.table;
        self.order.sort_by(|a, b| match (table.get(a), table.get(b)) {
            (Some(a), Some(b)) => newest_first(a, b),
            _ => b.cmp(a),
        });
    }

    /// Remove an entry and its slug mapping; absent ids are ignored
    pub fn remove(&mut self, id: ArticleId) -> Option<Arc<Article>> {
        let article = self.table.remove(&id)?;
        if self.slugs.get(&article.slug) == Some(&id) {
            self.slugs.remove(&article.slug);
        }
        if let Some(pos) = self.order.iter().position(|entry| *entry == id) {
            self.order.remove(pos);
        }
        Some(article)
    }

    pub fn get(&self, id: ArticleId) -> Option<&Arc<Article>> {
        self.table.get(&id)
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<&Arc<Article>> {
        self.slugs.get(slug).and_then(|id| self.table.get(id))
    }

    /// Id of the article using `slug`, if any
    pub fn slug_owner(&self, slug: &str) -> Option<ArticleId> {
        self.slugs.get(slug).copied()
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.table.contains_key(&id)
    }

    /// Index of `id` in list order
    pub fn position(&self, id: ArticleId) -> Option<usize> {
        let article = self.table.get(&id)?;
        let pos = self.insertion_point(article);
        (self.order.get(pos) == Some(&id)).then_some(pos)
    }

    /// Ids in list order
    pub fn ids(&self) -> &[ArticleId] {
        &self.order
    }

    /// Articles in list order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Article>> + '_ {
        self.order.iter().filter_map(|id| self.table.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn check_slug(&self, article: &Article) -> IndexResult<()> {
        match self.slugs.get(&article.slug) {
            Some(owner) if *owner != article.id => {
                Err(IndexError::DuplicateSlug(article.slug.clone()))
            }
            _ => Ok(()),
        }
    }

    /// First position whose entry does not sort before `article`
    fn insertion_point(&self, article: &Article) -> usize {
        self.order.partition_point(|id| {
            self.table
                .get(id)
                .is_some_and(|entry| newest_first(entry, article).is_lt())
        })
    }
}
