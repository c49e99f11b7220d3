//! Derived pages
//!
//! The series and archive overviews are rebuilt from the index whenever a
//! mutation marks them stale. Marking only flips a flag per page and wakes
//! the worker, so repeated marks before the worker runs collapse into one
//! rebuild.

pub mod worker;

pub use worker::{spawn_regeneration_worker, RegenerationHandle};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{watch, Notify};

use crate::index::groups::resolve;
use crate::index::IndexState;
use crate::models::Article;

/// Which derived page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Series,
    Archive,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKind::Series => write!(f, "series"),
            PageKind::Archive => write!(f, "archive"),
        }
    }
}

/// Set of pages a mutation made stale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StalePages {
    pub series: bool,
    pub archive: bool,
}

impl StalePages {
    pub fn all() -> Self {
        Self {
            series: true,
            archive: true,
        }
    }

    pub fn only(kind: PageKind) -> Self {
        let mut stale = Self::default();
        stale.mark(kind);
        stale
    }

    pub fn mark(&mut self, kind: PageKind) {
        match kind {
            PageKind::Series => self.series = true,
            PageKind::Archive => self.archive = true,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            series: self.series || other.series,
            archive: self.archive || other.archive,
        }
    }

    pub fn contains(&self, kind: PageKind) -> bool {
        match kind {
            PageKind::Series => self.series,
            PageKind::Archive => self.archive,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.series && !self.archive
    }

    pub fn kinds(self) -> impl Iterator<Item = PageKind> {
        [PageKind::Series, PageKind::Archive]
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

/// Publication counters, bumped every time a page is published
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageVersions {
    pub series: u64,
    pub archive: u64,
}

impl PageVersions {
    pub fn get(&self, kind: PageKind) -> u64 {
        match kind {
            PageKind::Series => self.series,
            PageKind::Archive => self.archive,
        }
    }

    fn bump(&mut self, kind: PageKind) {
        match kind {
            PageKind::Series => self.series += 1,
            PageKind::Archive => self.archive += 1,
        }
    }
}

/// Latest rendered HTML of each page, readable without locking
#[derive(Debug)]
pub struct PublishedPages {
    series: ArcSwap<String>,
    archive: ArcSwap<String>,
    versions: watch::Sender<PageVersions>,
}

impl Default for PublishedPages {
    fn default() -> Self {
        Self {
            series: ArcSwap::from_pointee(String::new()),
            archive: ArcSwap::from_pointee(String::new()),
            versions: watch::channel(PageVersions::default()).0,
        }
    }
}

impl PublishedPages {
    pub fn get(&self, kind: PageKind) -> Arc<String> {
        self.slot(kind).load_full()
    }

    /// Replace a page and notify version watchers
    pub fn publish(&self, kind: PageKind, html: String) {
        self.slot(kind).store(Arc::new(html));
        self.versions.send_modify(|versions| versions.bump(kind));
    }

    pub fn versions(&self) -> PageVersions {
        *self.versions.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PageVersions> {
        self.versions.subscribe()
    }

    fn slot(&self, kind: PageKind) -> &ArcSwap<String> {
        match kind {
            PageKind::Series => &self.series,
            PageKind::Archive => &self.archive,
        }
    }
}

/// Coalescing wake-up for the regeneration worker
#[derive(Debug, Default)]
pub struct RegenSignal {
    series: AtomicBool,
    archive: AtomicBool,
    closed: AtomicBool,
    notify: Notify,
}

impl RegenSignal {
    /// Flag pages as stale; never blocks
    pub fn mark(&self, stale: StalePages) {
        if stale.series {
            self.series.store(true, Ordering::Release);
        }
        if stale.archive {
            self.archive.store(true, Ordering::Release);
        }
        if !stale.is_empty() {
            self.notify.notify_one();
        }
    }

    /// Clear and return the pending flags
    pub fn take(&self) -> StalePages {
        StalePages {
            series: self.series.swap(false, Ordering::AcqRel),
            archive: self.archive.swap(false, Ordering::AcqRel),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait until something is stale; `None` once closed
    pub async fn wait(&self) -> Option<StalePages> {
        loop {
            if self.is_closed() {
                return None;
            }
            let stale = self.take();
            if !stale.is_empty() {
                return Some(stale);
            }
            self.notify.notified().await;
        }
    }
}

fn bullet(article: &Article, emphasised: bool) -> String {
    let line = format!(
        "[{}](/post/{}.html) <span class=\"date\">({})</span>",
        article.title,
        article.slug,
        article.created_at.format("%b %d, %Y")
    );
    if emphasised {
        format!("* *{}*\n", line)
    } else {
        format!("* {}\n", line)
    }
}

/// Markdown of the series overview
pub fn series_markdown(state: &IndexState, intro: &str) -> String {
    let mut out = String::new();
    out.push_str(intro);
    out.push_str("\n\n");

    for bucket in state.series().iter() {
        out.push_str(&format!(
            "### {} {{#toc-{}}}\n",
            bucket.serie.name, bucket.serie.id
        ));
        out.push_str(&bucket.serie.description);
        out.push_str("\n\n");
        for article in resolve(&bucket.members, state.list()) {
            out.push_str(&bullet(&article, false));
        }
        out.push('\n');
    }
    out
}

/// Months shown before the archive switches to year headings
pub const MONTH_HEADING_LIMIT: usize = 12;

/// Markdown of the archive overview
///
/// Up to `MONTH_HEADING_LIMIT` months get one heading each. Past that the
/// page is grouped by year and the first article under each year is
/// emphasised.
pub fn archive_markdown(state: &IndexState, intro: &str) -> String {
    let archives = state.archives();
    let by_year = archives.len() > MONTH_HEADING_LIMIT;

    let mut out = String::new();
    out.push_str(intro);
    out.push('\n');

    let mut current_year = None;
    for (key, members) in archives.iter() {
        let mut emphasise = false;
        if by_year {
            if current_year != Some(key.year) {
                current_year = Some(key.year);
                emphasise = true;
                out.push_str(&format!("\n### {}\n\n", key.year));
            }
        } else {
            let heading = key
                .first_day()
                .map(|day| day.format("%B %Y").to_string())
                .unwrap_or_else(|| key.to_string());
            out.push_str(&format!("\n### {}\n\n", heading));
        }

        for article in resolve(members, state.list()) {
            out.push_str(&bullet(&article, emphasise));
            emphasise = false;
        }
    }
    out
}

/// Markdown of either page
pub fn page_markdown(kind: PageKind, state: &IndexState, intro: &str) -> String {
    match kind {
        PageKind::Series => series_markdown(state, intro),
        PageKind::Archive => archive_markdown(state, intro),
    }
}
