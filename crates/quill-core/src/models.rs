//! Data models for Quill
//!
//! Defines the core data structures: Article, Serie and the keys the
//! secondary indices group them by.
//!
//! Articles never point at each other. Navigation and bucket membership live
//! in the index as `ArticleId`s so that the chronological list's table is the
//! only owner of article data.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Article identifier, allocated by the ID generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub i64);

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ArticleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Series identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerieId(pub i64);

impl fmt::Display for SerieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SerieId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Fields computed from `content` by the renderer
///
/// Never persisted; recomputed on bootstrap and on every replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derived {
    /// One-line description taken from a leading description line
    pub description: Option<String>,
    /// Table of contents split off the rendered body
    pub header: Option<String>,
    /// Rendered body
    pub html: String,
    /// Plain-text excerpt for listings
    pub excerpt: String,
}

/// A blog article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Unique identifier
    pub id: ArticleId,
    /// URL name, unique across the blog
    pub slug: String,
    /// Display title
    pub title: String,
    /// Author name
    pub author: String,
    /// Markdown source
    pub content: String,
    /// Tags for grouping
    pub tags: Vec<String>,
    /// Owning series, if any
    pub serie_id: Option<SerieId>,
    /// Drafts are stored but never indexed
    pub is_draft: bool,
    /// When this article was created
    pub created_at: DateTime<Utc>,
    /// When this article was last updated
    pub updated_at: DateTime<Utc>,
    /// Set while the article sits in the trash
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub derived: Derived,
}

impl Article {
    /// Create an article with a specific ID (for loading from storage)
    pub fn with_id(id: ArticleId, slug: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            slug: slug.into(),
            title: title.into(),
            author: String::new(),
            content: String::new(),
            tags: Vec::new(),
            serie_id: None,
            is_draft: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            derived: Derived::default(),
        }
    }

    /// Update the markdown content
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.updated_at = Utc::now();
    }

    /// Add a tag
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
            self.updated_at = Utc::now();
        }
    }

    /// Remove a tag
    pub fn remove_tag(&mut self, tag: &str) {
        if let Some(pos) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(pos);
            self.updated_at = Utc::now();
        }
    }

    /// Set all tags (replacing existing), dropping duplicates
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags.clear();
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self.updated_at = Utc::now();
    }

    /// Whether the article is in the trash
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the article belongs in the chronological list
    pub fn is_published(&self) -> bool {
        !self.is_draft && !self.is_deleted()
    }

    /// The archive bucket this article falls into
    pub fn archive_key(&self) -> ArchiveKey {
        ArchiveKey::from_datetime(&self.created_at)
    }
}

/// Chronological order: newest first, ties broken by the larger id
pub fn newest_first(a: &Article, b: &Article) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Input for creating an article; the ID is assigned on insert
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    pub author: String,
    pub content: String,
    pub tags: Vec<String>,
    pub serie_id: Option<SerieId>,
    pub is_draft: bool,
    /// Defaults to the insertion time
    pub created_at: Option<DateTime<Utc>>,
}

impl NewArticle {
    /// Create a new article with the given slug and title
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Turn the input into a stored article with the allocated id
    pub fn into_article(self, id: ArticleId, now: DateTime<Utc>) -> Article {
        let mut article = Article::with_id(id, self.slug, self.title);
        article.author = self.author;
        article.content = self.content;
        article.set_tags(self.tags);
        article.serie_id = self.serie_id;
        article.is_draft = self.is_draft;
        article.created_at = self.created_at.unwrap_or(now);
        article.updated_at = now;
        article
    }
}

/// A series of related articles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Serie {
    /// Unique identifier
    pub id: SerieId,
    /// Display name
    pub name: String,
    /// URL name
    pub slug: String,
    /// Description shown on the series page
    pub description: String,
    /// When this series was created
    pub created_at: DateTime<Utc>,
}

impl Serie {
    /// Create a series with a specific ID
    pub fn new(
        id: SerieId,
        name: impl Into<String>,
        slug: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            slug: slug.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Calendar month an article was created in (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchiveKey {
    pub year: i32,
    pub month: u32,
}

impl ArchiveKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_datetime(at: &DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// First day of the month, for formatting
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
