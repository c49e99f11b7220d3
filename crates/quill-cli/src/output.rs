//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::sync::Arc;

use serde::Serialize;

use quill_core::index::{ArchiveView, SerieView};
use quill_core::{Article, NavLinks, Page};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single article with its navigation neighbours
    pub fn print_article(&self, article: &Article, links: Option<NavLinks>) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", article.id);
                println!("Slug:        {}", article.slug);
                println!("Title:       {}", article.title);
                if !article.author.is_empty() {
                    println!("Author:      {}", article.author);
                }
                if let Some(ref desc) = article.derived.description {
                    println!("Description: {}", desc);
                }
                if !article.tags.is_empty() {
                    println!("Tags:        {}", article.tags.join(", "));
                }
                if let Some(serie_id) = article.serie_id {
                    println!("Series:      {}", serie_id);
                }
                println!("State:       {}", state_label(article));
                println!("Created:     {}", article.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:     {}", article.updated_at.format("%Y-%m-%d %H:%M"));
                if let Some(links) = links {
                    println!(
                        "Newer:       {}",
                        links.prev.map(|id| id.to_string()).unwrap_or_else(|| "-".into())
                    );
                    println!(
                        "Older:       {}",
                        links.next.map(|id| id.to_string()).unwrap_or_else(|| "-".into())
                    );
                }
                if !article.derived.excerpt.is_empty() {
                    println!();
                    println!("{}", truncate(&article.derived.excerpt, 200));
                }
            }
            OutputFormat::Json => {
                print_json(&serde_json::json!({
                    "article": article,
                    "nav": links,
                }));
            }
            OutputFormat::Quiet => {
                println!("{}", article.id);
            }
        }
    }

    /// Print a list of articles
    pub fn print_articles(&self, articles: &[Article]) {
        match self.format {
            OutputFormat::Human => {
                if articles.is_empty() {
                    println!("No articles found.");
                    return;
                }
                for article in articles {
                    print_row(article);
                }
                println!("\n{} article(s)", articles.len());
            }
            OutputFormat::Json => print_json(&articles),
            OutputFormat::Quiet => {
                for article in articles {
                    println!("{}", article.id);
                }
            }
        }
    }

    /// Print articles shared out of the index
    pub fn print_listed(&self, articles: &[Arc<Article>]) {
        let articles: Vec<Article> = articles.iter().map(|a| Article::clone(a)).collect();
        self.print_articles(&articles);
    }

    /// Print one page of the chronological listing
    pub fn print_page(&self, page: &Page) {
        match self.format {
            OutputFormat::Human => {
                if page.total_pages == 0 {
                    println!("No articles published.");
                    return;
                }
                for article in &page.articles {
                    print_row(article);
                }
                println!();
                println!("Page {} of {}", page.number, page.total_pages);
                if page.prev > 0 {
                    println!("  newer: --page {}", page.prev);
                }
                if page.next > 0 {
                    println!("  older: --page {}", page.next);
                }
            }
            OutputFormat::Json => {
                let articles: Vec<&Article> = page.articles.iter().map(|a| a.as_ref()).collect();
                print_json(&serde_json::json!({
                    "page": page.number,
                    "total_pages": page.total_pages,
                    "prev": page.prev,
                    "next": page.next,
                    "articles": articles,
                }));
            }
            OutputFormat::Quiet => {
                for article in &page.articles {
                    println!("{}", article.id);
                }
            }
        }
    }

    /// Print series with their member counts
    pub fn print_series(&self, series: &[SerieView]) {
        match self.format {
            OutputFormat::Human => {
                if series.is_empty() {
                    println!("No series found.");
                    return;
                }
                for view in series {
                    println!(
                        "{} | {} ({}) | {} article(s)",
                        view.serie.id,
                        truncate(&view.serie.name, 35),
                        view.serie.slug,
                        view.articles.len()
                    );
                }
                println!("\n{} series", series.len());
            }
            OutputFormat::Json => {
                let json: Vec<_> = series
                    .iter()
                    .map(|view| {
                        let members: Vec<_> = view.articles.iter().map(|a| a.id).collect();
                        serde_json::json!({"serie": view.serie, "articles": members})
                    })
                    .collect();
                print_json(&json);
            }
            OutputFormat::Quiet => {
                for view in series {
                    println!("{}", view.serie.id);
                }
            }
        }
    }

    /// Print archive months with their articles
    pub fn print_archives(&self, archives: &[ArchiveView]) {
        match self.format {
            OutputFormat::Human => {
                if archives.is_empty() {
                    println!("Archive is empty.");
                    return;
                }
                for view in archives {
                    println!("{} ({})", view.key, view.articles.len());
                    for article in &view.articles {
                        println!("  {} | {}", article.id, truncate(&article.title, 50));
                    }
                }
            }
            OutputFormat::Json => {
                let json: Vec<_> = archives
                    .iter()
                    .map(|view| {
                        let members: Vec<_> = view.articles.iter().map(|a| a.id).collect();
                        serde_json::json!({"month": view.key.to_string(), "articles": members})
                    })
                    .collect();
                print_json(&json);
            }
            OutputFormat::Quiet => {
                for view in archives {
                    println!("{}", view.key);
                }
            }
        }
    }

    /// Print a list of tags
    pub fn print_tags(&self, tags: &[(String, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for (name, count) in tags {
                    println!("{} ({})", name, count);
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                    .collect();
                print_json(&json_tags);
            }
            OutputFormat::Quiet => {
                for (name, _) in tags {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print a rendered page
    pub fn print_html(&self, name: &str, html: &str) {
        match self.format {
            OutputFormat::Json => print_json(&serde_json::json!({"page": name, "html": html})),
            OutputFormat::Human | OutputFormat::Quiet => println!("{}", html),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON output: {}", e),
    }
}

fn print_row(article: &Article) {
    println!(
        "{:>6} | {} | {} | {}",
        article.id,
        article.created_at.format("%Y-%m-%d"),
        truncate(&article.title, 40),
        truncate(&article.slug, 30)
    );
}

fn state_label(article: &Article) -> &'static str {
    if article.is_deleted() {
        "trash"
    } else if article.is_draft {
        "draft"
    } else {
        "published"
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ArticleId;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("日本語のタイトルです", 6), "日本語...");
    }

    #[test]
    fn test_state_label() {
        let mut article = Article::with_id(ArticleId(11), "a", "A");
        assert_eq!(state_label(&article), "published");
        article.is_draft = true;
        assert_eq!(state_label(&article), "draft");
        article.deleted_at = Some(chrono::Utc::now());
        assert_eq!(state_label(&article), "trash");
    }
}
