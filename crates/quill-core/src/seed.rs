//! Static pages created on first run

use std::collections::HashSet;

use chrono::DateTime;
use tracing::info;

use crate::error::IndexResult;
use crate::index::ContentIndex;
use crate::models::{Article, NewArticle};

/// Slug and title of every seeded page
pub const STATIC_PAGES: &[(&str, &str)] = &[("about", "About"), ("blogroll", "Blogroll")];

/// Create the `about` and `blogroll` pages below the visibility boundary
///
/// Pages that already exist, published or not, are left alone. Returns the
/// pages created.
pub fn seed_static_pages(index: &ContentIndex, author: &str) -> IndexResult<Vec<Article>> {
    let unlisted: HashSet<String> = index
        .drafts()?
        .into_iter()
        .chain(index.trash()?)
        .map(|article| article.slug)
        .collect();

    let mut created = Vec::new();
    for (slug, title) in STATIC_PAGES {
        if index.lookup_by_slug(slug).is_ok() || unlisted.contains(*slug) {
            continue;
        }
        let mut page = NewArticle::new(*slug, *title);
        page.author = author.to_string();
        page.created_at = Some(DateTime::UNIX_EPOCH);
        created.push(index.add_static_page(page)?);
    }

    if !created.is_empty() {
        info!(count = created.len(), "Seeded static pages");
    }
    Ok(created)
}
