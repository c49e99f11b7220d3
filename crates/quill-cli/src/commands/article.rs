//! Article command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use quill_core::{AdminQuery, Article, ArticleId, ContentIndex, NewArticle, SerieId};

use crate::output::Output;

/// Arguments of `quill publish`
pub struct PublishArgs {
    pub file: PathBuf,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub tags: Vec<String>,
    pub serie: Option<i64>,
    pub draft: bool,
    /// Replace this article instead of creating a new one
    pub replace: Option<i64>,
    pub author: String,
}

/// Create or replace an article from a markdown file
pub fn publish(index: &ContentIndex, args: PublishArgs, output: &Output) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {:?}", args.file))?;

    let title = match args.title {
        Some(title) => title,
        None => title_from_markdown(&content)
            .context("No --title given and the file has no '# ' heading")?,
    };
    let slug = args.slug.unwrap_or_else(|| slugify(&title));
    if slug.is_empty() {
        bail!("Could not derive a slug from '{}'; pass --slug", title);
    }

    let article = match args.replace {
        Some(id) => {
            let id = ArticleId(id);
            let mut article = index.fetch(id)?;
            article.title = title;
            article.slug = slug;
            article.set_content(content);
            article.set_tags(args.tags);
            article.serie_id = args.serie.map(SerieId);
            article.is_draft = args.draft;
            let replaced = index
                .replace_article(id, article)
                .context("Failed to replace article")?;
            output.success(&format!("Replaced article {}", replaced.id));
            replaced
        }
        None => {
            let input = NewArticle {
                slug,
                title,
                author: args.author,
                content,
                tags: args.tags,
                serie_id: args.serie.map(SerieId),
                is_draft: args.draft,
                created_at: None,
            };
            let added = index
                .add_article(input)
                .context("Failed to publish article")?;
            let verb = if added.is_draft { "Saved draft" } else { "Published" };
            output.success(&format!("{} article {}", verb, added.id));
            added
        }
    };

    output.print_article(&article, index.neighbors(article.id));
    Ok(())
}

/// Show one page of the public listing
pub fn list(index: &ContentIndex, page: usize, page_size: usize, output: &Output) -> Result<()> {
    output.print_page(&index.page(page, page_size));
    Ok(())
}

/// Show an article by slug or id
pub fn show(index: &ContentIndex, key: String, output: &Output) -> Result<()> {
    let article: Article = match index.lookup_by_slug(&key) {
        Ok(article) => Article::clone(&article),
        Err(_) => {
            let id: i64 = key
                .parse()
                .map_err(|_| anyhow::anyhow!("Article not found: {}", key))?;
            index.fetch(ArticleId(id))?
        }
    };

    output.print_article(&article, index.neighbors(article.id));
    Ok(())
}

/// Move articles to the trash
pub fn delete(index: &ContentIndex, ids: Vec<i64>, output: &Output) -> Result<()> {
    let ids: Vec<ArticleId> = ids.into_iter().map(ArticleId).collect();
    let count = index
        .del_articles(&ids)
        .context("Failed to delete articles")?;
    output.success(&format!("Moved {} article(s) to trash", count));
    Ok(())
}

/// Restore an article from the trash as a draft
pub fn recover(index: &ContentIndex, id: i64, output: &Output) -> Result<()> {
    index
        .recover_article(ArticleId(id))
        .context("Failed to recover article")?;
    output.success(&format!("Recovered article {} to drafts", id));
    Ok(())
}

/// Permanently delete an article
pub fn remove(index: &ContentIndex, id: i64, output: &Output) -> Result<()> {
    index
        .remove_article(ArticleId(id))
        .context("Failed to remove article")?;
    output.success(&format!("Removed article {}", id));
    Ok(())
}

pub fn drafts(index: &ContentIndex, output: &Output) -> Result<()> {
    output.print_articles(&index.drafts()?);
    Ok(())
}

pub fn trash(index: &ContentIndex, output: &Output) -> Result<()> {
    output.print_articles(&index.trash()?);
    Ok(())
}

/// Filtered listing straight from the store
pub fn admin(index: &ContentIndex, query: AdminQuery, output: &Output) -> Result<()> {
    let page = index.admin_list(&query)?;
    output.print_articles(&page.articles);
    if !output.is_quiet() && !output.is_json() {
        println!("Page {} of {}", query.page.max(1), page.total_pages);
    }
    Ok(())
}

/// First `# ` heading of a markdown document
fn title_from_markdown(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Lowercase ASCII words joined by '-'
fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
