//! Content index
//!
//! `IndexState` is one consistent snapshot of every in-memory structure:
//! the chronological list, the navigation chain and the tag, series and
//! archive indices. `ContentIndex` owns the current snapshot and the
//! collaborators (store, renderer, id generator).
//!
//! # Reads and writes
//!
//! Reads load the current snapshot from an `ArcSwap` and never lock.
//! Mutations are serialized by one mutex. Each one writes to the store first,
//! then builds the next snapshot from a clone of the current one and swaps it
//! in, so readers only ever see the state before or after a mutation. A store
//! failure returns before anything in memory changes.

pub mod chrono_list;
pub mod groups;
pub mod nav;
pub mod pagination;

pub use chrono_list::ChronoList;
pub use groups::{ArchiveIndex, SerieBucket, SeriesIndex, TagIndex};
pub use nav::{NavChain, NavLinks};
pub use pagination::{paginate, Page};

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{IndexError, IndexResult};
use crate::ids::IdGenerator;
use crate::models::{ArchiveKey, Article, ArticleId, NewArticle, Serie, SerieId};
use crate::pages::{self, PageKind, PageVersions, PublishedPages, RegenSignal, StalePages};
use crate::render::{derive_fields, ExcerptRules, Renderer};
use crate::storage::{AdminPage, AdminQuery, ArticleStore, Shelf, StorageError};

/// Settings the index needs from configuration
#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// Visibility boundary
    pub start_id: i64,
    pub excerpt_marker: String,
    pub excerpt_length: usize,
    pub description_prefix: String,
    pub series_intro: String,
    pub archives_intro: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            start_id: 11,
            excerpt_marker: "<!--more-->".to_string(),
            excerpt_length: 200,
            description_prefix: "Desc:".to_string(),
            series_intro: String::new(),
            archives_intro: String::new(),
        }
    }
}

/// A series with its member articles
#[derive(Debug, Clone)]
pub struct SerieView {
    pub serie: Serie,
    pub articles: Vec<Arc<Article>>,
}

/// One archive month with its articles
#[derive(Debug, Clone)]
pub struct ArchiveView {
    pub key: ArchiveKey,
    pub articles: Vec<Arc<Article>>,
}

/// Every in-memory structure, consistent with each other
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    boundary: i64,
    list: ChronoList,
    nav: NavChain,
    tags: TagIndex,
    series: SeriesIndex,
    archives: ArchiveIndex,
}

impl IndexState {
    pub fn new(boundary: i64) -> Self {
        Self {
            boundary,
            nav: NavChain::new(boundary),
            ..Self::default()
        }
    }

    /// Build a state from scratch, sorting each structure once at the end
    pub fn bulk_load(
        boundary: i64,
        series: Vec<Serie>,
        articles: Vec<Article>,
    ) -> IndexResult<Self> {
        let mut state = Self::new(boundary);
        state.series = SeriesIndex::from_series(series);

        for article in articles.into_iter().filter(Article::is_published) {
            if state.is_visible(article.id) {
                state.tags.push(&article);
                state.series.push(&article);
                state.archives.push(&article);
            }
            state.list.push_unsorted(Arc::new(article))?;
        }

        state.list.sort();
        state.nav.rebuild(&state.list);
        state.tags.sort_all(&state.list);
        state.series.sort_all(&state.list);
        state.archives.sort_all(&state.list);
        Ok(state)
    }

    /// List, link and index one published article
    pub fn index_one(&mut self, article: Article) -> IndexResult<StalePages> {
        let article = Arc::new(article);
        self.list.insert(Arc::clone(&article))?;

        let mut stale = StalePages::default();
        if !self.is_visible(article.id) {
            return Ok(stale);
        }

        self.nav.link(&self.list, article.id);
        self.tags.add(&article, &self.list);
        if self.series.add(&article, &self.list) {
            stale.mark(PageKind::Series);
        }
        self.archives.add(&article, &self.list);
        stale.mark(PageKind::Archive);
        Ok(stale)
    }

    /// Unlink, unindex and unlist one article; `None` if it is not listed
    pub fn unindex_one(&mut self, id: ArticleId) -> Option<(Arc<Article>, StalePages)> {
        let article = Arc::clone(self.list.get(id)?);

        let mut stale = StalePages::default();
        if self.is_visible(id) {
            self.nav.unlink(id);
            self.tags.remove(&article);
            if self.series.remove(&article) {
                stale.mark(PageKind::Series);
            }
            if self.archives.remove(&article) {
                stale.mark(PageKind::Archive);
            }
        }
        self.list.remove(id);
        Some((article, stale))
    }

    /// Fail if `slug` belongs to a listed article other than `except`
    pub fn check_slug(&self, slug: &str, except: Option<ArticleId>) -> IndexResult<()> {
        match self.list.slug_owner(slug) {
            Some(owner) if Some(owner) != except => Err(IndexError::DuplicateSlug(slug.to_string())),
            _ => Ok(()),
        }
    }

    pub fn is_visible(&self, id: ArticleId) -> bool {
        id.0 >= self.boundary
    }

    pub fn boundary(&self) -> i64 {
        self.boundary
    }

    pub fn list(&self) -> &ChronoList {
        &self.list
    }

    pub fn nav(&self) -> &NavChain {
        &self.nav
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn series(&self) -> &SeriesIndex {
        &self.series
    }

    pub fn archives(&self) -> &ArchiveIndex {
        &self.archives
    }

    pub fn page(&self, page_number: usize, page_size: usize) -> Page {
        paginate(&self.list, self.boundary, page_number, page_size)
    }
}

/// Map a store write failure, reporting uniqueness violations on `slug`
fn slug_conflict(slug: &str) -> impl FnOnce(StorageError) -> IndexError + '_ {
    move |err| {
        if err.is_constraint_violation() {
            IndexError::DuplicateSlug(slug.to_string())
        } else {
            err.into()
        }
    }
}

fn validate_article(slug: &str, title: &str) -> IndexResult<()> {
    if slug.trim().is_empty() {
        return Err(IndexError::Validation("slug must not be empty".into()));
    }
    if slug.contains(char::is_whitespace) || slug.contains('/') {
        return Err(IndexError::Validation(format!(
            "slug '{}' must not contain whitespace or '/'",
            slug
        )));
    }
    if title.trim().is_empty() {
        return Err(IndexError::Validation("title must not be empty".into()));
    }
    Ok(())
}

/// The content index service
pub struct ContentIndex {
    state: ArcSwap<IndexState>,
    write_lock: Mutex<()>,
    store: Arc<dyn ArticleStore>,
    renderer: Arc<dyn Renderer>,
    ids: Arc<dyn IdGenerator>,
    settings: IndexSettings,
    rules: ExcerptRules,
    signal: Arc<RegenSignal>,
    pages: PublishedPages,
}

impl ContentIndex {
    /// Load every series and published article from the store
    ///
    /// Both derived pages start out stale. Any failure here is fatal.
    pub fn initialize(
        store: Arc<dyn ArticleStore>,
        renderer: Arc<dyn Renderer>,
        ids: Arc<dyn IdGenerator>,
        settings: IndexSettings,
    ) -> IndexResult<Self> {
        let rules = ExcerptRules::new(
            &settings.excerpt_marker,
            settings.excerpt_length,
            settings.description_prefix.clone(),
        )?;

        let series = store.fetch_series()?;
        let mut articles = store.fetch_published()?;
        for article in &mut articles {
            article.derived = derive_fields(renderer.as_ref(), &article.content, &rules)?;
        }

        let state = IndexState::bulk_load(settings.start_id, series, articles)?;
        info!(
            articles = state.list().len(),
            series = state.series().len(),
            months = state.archives().len(),
            tags = state.tags().len(),
            "Content index loaded"
        );

        let index = Self {
            state: ArcSwap::from_pointee(state),
            write_lock: Mutex::new(()),
            store,
            renderer,
            ids,
            settings,
            rules,
            signal: Arc::new(RegenSignal::default()),
            pages: PublishedPages::default(),
        };
        index.signal.mark(StalePages::all());
        Ok(index)
    }

    // ---- reads ----

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<IndexState> {
        self.state.load_full()
    }

    pub fn lookup(&self, id: ArticleId) -> IndexResult<Arc<Article>> {
        self.state
            .load()
            .list()
            .get(id)
            .cloned()
            .ok_or(IndexError::ArticleNotFound(id))
    }

    pub fn lookup_by_slug(&self, slug: &str) -> IndexResult<Arc<Article>> {
        self.state
            .load()
            .list()
            .get_by_slug(slug)
            .cloned()
            .ok_or_else(|| IndexError::SlugNotFound(slug.to_string()))
    }

    /// Newer and older neighbours; `None` for unlisted or static pages
    pub fn neighbors(&self, id: ArticleId) -> Option<NavLinks> {
        self.state.load().nav().neighbors(id)
    }

    pub fn page(&self, page_number: usize, page_size: usize) -> Page {
        self.state.load().page(page_number, page_size)
    }

    pub fn query_serie(&self, id: SerieId) -> IndexResult<SerieView> {
        let state = self.state.load();
        let bucket = state
            .series()
            .get(id)
            .ok_or(IndexError::SerieNotFound(id))?;
        Ok(SerieView {
            serie: bucket.serie.clone(),
            articles: groups::resolve(&bucket.members, state.list()),
        })
    }

    /// Every series, largest id first
    pub fn series(&self) -> Vec<SerieView> {
        let state = self.state.load();
        state
            .series()
            .iter()
            .map(|bucket| SerieView {
                serie: bucket.serie.clone(),
                articles: groups::resolve(&bucket.members, state.list()),
            })
            .collect()
    }

    /// Archive months, newest first
    pub fn archives(&self) -> Vec<ArchiveView> {
        let state = self.state.load();
        state
            .archives()
            .iter()
            .map(|(key, members)| ArchiveView {
                key,
                articles: groups::resolve(members, state.list()),
            })
            .collect()
    }

    /// Tags with their article counts, in name order
    pub fn tags(&self) -> Vec<(String, usize)> {
        self.state
            .load()
            .tags()
            .iter()
            .map(|(tag, members)| (tag.to_string(), members.len()))
            .collect()
    }

    pub fn articles_by_tag(&self, tag: &str) -> Vec<Arc<Article>> {
        let state = self.state.load();
        state
            .tags()
            .get(tag)
            .map(|members| groups::resolve(members, state.list()))
            .unwrap_or_default()
    }

    /// Number of listed articles, static pages included
    pub fn article_count(&self) -> usize {
        self.state.load().list().len()
    }

    pub fn page_series(&self) -> Arc<String> {
        self.pages.get(PageKind::Series)
    }

    pub fn page_archives(&self) -> Arc<String> {
        self.pages.get(PageKind::Archive)
    }

    pub fn page_versions(&self) -> PageVersions {
        self.pages.versions()
    }

    pub fn subscribe_pages(&self) -> watch::Receiver<PageVersions> {
        self.pages.subscribe()
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn ArticleStore> {
        Arc::clone(&self.store)
    }

    pub(crate) fn regen_signal(&self) -> Arc<RegenSignal> {
        Arc::clone(&self.signal)
    }

    // ---- store pass-through reads ----

    pub fn drafts(&self) -> IndexResult<Vec<Article>> {
        Ok(self.store.fetch_draft_or_trash(Shelf::Drafts)?)
    }

    pub fn trash(&self) -> IndexResult<Vec<Article>> {
        Ok(self.store.fetch_draft_or_trash(Shelf::Trash)?)
    }

    pub fn admin_list(&self, query: &AdminQuery) -> IndexResult<AdminPage> {
        Ok(self.store.list_admin(query)?)
    }

    /// An article in any state, straight from the store
    pub fn fetch(&self, id: ArticleId) -> IndexResult<Article> {
        self.store.fetch(id)?.ok_or(IndexError::ArticleNotFound(id))
    }

    // ---- derived pages ----

    /// Rebuild one derived page from the current snapshot
    ///
    /// On failure the previously published page stays in place.
    pub fn regenerate(&self, kind: PageKind) -> IndexResult<()> {
        let state = self.state.load_full();
        let intro = match kind {
            PageKind::Series => &self.settings.series_intro,
            PageKind::Archive => &self.settings.archives_intro,
        };
        let markdown = pages::page_markdown(kind, &state, intro);
        let html = self.renderer.to_html(&markdown)?;
        self.pages.publish(kind, html);
        debug!(page = %kind, "Published derived page");
        Ok(())
    }

    /// Rebuild every page currently flagged stale
    ///
    /// Each page is attempted; the ones that fail are flagged stale again and
    /// the first error is returned.
    pub fn regenerate_stale(&self) -> IndexResult<()> {
        let mut first_error = None;
        for kind in self.signal.take().kinds() {
            if let Err(e) = self.regenerate(kind) {
                self.signal.mark(StalePages::only(kind));
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ---- mutations ----

    /// Create an article with an id at or above the visibility boundary
    pub fn add_article(&self, input: NewArticle) -> IndexResult<Article> {
        self.insert_new(input, self.settings.start_id)
    }

    /// Create a static page with an id below the visibility boundary
    pub fn add_static_page(&self, input: NewArticle) -> IndexResult<Article> {
        self.insert_new(input, 0)
    }

    fn insert_new(&self, input: NewArticle, floor: i64) -> IndexResult<Article> {
        validate_article(&input.slug, &input.title)?;

        let _guard = self.write_lock.lock();
        let current = self.state.load_full();
        current.check_slug(&input.slug, None)?;
        self.check_serie(&current, input.serie_id)?;

        let id = ArticleId(self.ids.next_id(floor)?);
        if floor < self.settings.start_id && id.0 >= self.settings.start_id {
            return Err(IndexError::Validation(format!(
                "no static page ids left below {}",
                self.settings.start_id
            )));
        }

        let mut article = input.into_article(id, Utc::now());
        if article.is_published() {
            article.derived = derive_fields(self.renderer.as_ref(), &article.content, &self.rules)?;
        }
        self.store
            .insert(&article)
            .map_err(slug_conflict(&article.slug))?;

        if article.is_published() {
            let mut next = IndexState::clone(&current);
            let stale = next.index_one(article.clone())?;
            self.publish(next, stale);
        }

        info!(id = %article.id, slug = %article.slug, draft = article.is_draft, "Added article");
        Ok(article)
    }

    /// Replace the stored and indexed article `old_id` with `article`
    ///
    /// The replacement takes over `old_id`, and keeps the creation time of
    /// the listed predecessor so its archive month never moves. Publishing a
    /// draft is a replace whose predecessor is not listed.
    pub fn replace_article(&self, old_id: ArticleId, article: Article) -> IndexResult<Article> {
        validate_article(&article.slug, &article.title)?;

        let _guard = self.write_lock.lock();
        let current = self.state.load_full();
        let predecessor = current.list().get(old_id).cloned();

        let mut article = article;
        article.id = old_id;
        article.updated_at = Utc::now();
        if let Some(previous) = &predecessor {
            article.created_at = previous.created_at;
        }
        current.check_slug(&article.slug, Some(old_id))?;
        self.check_serie(&current, article.serie_id)?;

        article.derived = if article.is_published() {
            derive_fields(self.renderer.as_ref(), &article.content, &self.rules)?
        } else {
            Default::default()
        };
        self.store
            .update(&article)
            .map_err(slug_conflict(&article.slug))?;

        if predecessor.is_some() || article.is_published() {
            let mut next = IndexState::clone(&current);
            let mut stale = StalePages::default();
            if let Some((_, removed)) = next.unindex_one(old_id) {
                stale = stale.merge(removed);
            }
            if article.is_published() {
                stale = stale.merge(next.index_one(article.clone())?);
            }
            self.publish(next, stale);
        }

        info!(id = %old_id, slug = %article.slug, draft = article.is_draft, "Replaced article");
        Ok(article)
    }

    /// Move articles to the trash
    ///
    /// Every id is checked before anything is written. Each article is then
    /// marked in the store and removed from memory in turn; if the store
    /// fails midway, the articles already trashed stay removed and the
    /// error is returned.
    pub fn del_articles(&self, ids: &[ArticleId]) -> IndexResult<usize> {
        let _guard = self.write_lock.lock();
        let current = self.state.load_full();

        let mut targets: Vec<ArticleId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if targets.contains(&id) {
                continue;
            }
            if !current.list().contains(id) && self.store.fetch(id)?.is_none() {
                return Err(IndexError::ArticleNotFound(id));
            }
            targets.push(id);
        }

        let now = Utc::now();
        let mut next = IndexState::clone(&current);
        let mut stale = StalePages::default();
        let mut trashed = 0;

        for id in targets {
            if let Err(e) = self.store.mark_deleted(id, now) {
                warn!(id = %id, trashed, error = %e, "Store failed while trashing articles");
                if trashed > 0 {
                    self.publish(next, stale);
                }
                return Err(e.into());
            }
            if let Some((_, removed)) = next.unindex_one(id) {
                stale = stale.merge(removed);
            }
            trashed += 1;
        }

        self.publish(next, stale);
        info!(count = trashed, "Moved articles to trash");
        Ok(trashed)
    }

    /// Take an article out of the trash; it comes back as a draft
    pub fn recover_article(&self, id: ArticleId) -> IndexResult<()> {
        let _guard = self.write_lock.lock();
        self.store.recover(id)?;
        info!(id = %id, "Recovered article to drafts");
        Ok(())
    }

    /// Permanently delete an article from the store
    pub fn remove_article(&self, id: ArticleId) -> IndexResult<()> {
        let _guard = self.write_lock.lock();
        if self.state.load().list().contains(id) {
            return Err(IndexError::Validation(format!(
                "article {} is published; trash it first",
                id
            )));
        }
        self.store.delete(id)?;
        info!(id = %id, "Removed article permanently");
        Ok(())
    }

    pub fn add_serie(
        &self,
        name: impl Into<String>,
        slug: impl Into<String>,
        description: impl Into<String>,
    ) -> IndexResult<Serie> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IndexError::Validation("series name must not be empty".into()));
        }

        let _guard = self.write_lock.lock();
        let id = SerieId(self.ids.next_id(self.settings.start_id)?);
        let serie = Serie::new(id, name, slug, description);
        self.store.insert_serie(&serie)?;

        let mut next = IndexState::clone(&self.state.load());
        next.series.upsert(serie.clone());
        self.publish(next, StalePages::only(PageKind::Series));

        info!(id = %serie.id, name = %serie.name, "Added series");
        Ok(serie)
    }

    /// Update a series' name, slug and description
    pub fn update_serie(&self, serie: Serie) -> IndexResult<Serie> {
        let _guard = self.write_lock.lock();
        let current = self.state.load_full();
        let existing = current
            .series()
            .get(serie.id)
            .ok_or(IndexError::SerieNotFound(serie.id))?;

        let serie = Serie {
            created_at: existing.serie.created_at,
            ..serie
        };
        self.store.update_serie(&serie)?;

        let mut next = IndexState::clone(&current);
        next.series.upsert(serie.clone());
        self.publish(next, StalePages::only(PageKind::Series));

        info!(id = %serie.id, "Updated series");
        Ok(serie)
    }

    /// Delete a series that has no published members left
    pub fn del_serie(&self, id: SerieId) -> IndexResult<()> {
        let _guard = self.write_lock.lock();
        let current = self.state.load_full();
        let bucket = current
            .series()
            .get(id)
            .ok_or(IndexError::SerieNotFound(id))?;
        if !bucket.members.is_empty() {
            return Err(IndexError::Validation(format!(
                "series {} still has {} article(s)",
                id,
                bucket.members.len()
            )));
        }
        self.store.delete_serie(id)?;

        let mut next = IndexState::clone(&current);
        next.series.remove_serie(id);
        self.publish(next, StalePages::only(PageKind::Series));

        info!(id = %id, "Deleted series");
        Ok(())
    }

    fn check_serie(&self, state: &IndexState, serie_id: Option<SerieId>) -> IndexResult<()> {
        match serie_id {
            Some(id) if state.series().get(id).is_none() => Err(IndexError::SerieNotFound(id)),
            _ => Ok(()),
        }
    }

    /// Swap in the next snapshot, then flag stale pages
    fn publish(&self, next: IndexState, stale: StalePages) {
        self.state.store(Arc::new(next));
        self.signal.mark(stale);
    }
}
