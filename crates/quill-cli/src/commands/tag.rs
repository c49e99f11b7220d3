//! Tag command handlers

use anyhow::Result;

use quill_core::ContentIndex;

use crate::output::Output;

/// List all tags with usage counts, or the articles carrying one tag
pub fn list(index: &ContentIndex, tag: Option<String>, output: &Output) -> Result<()> {
    match tag {
        Some(tag) => output.print_listed(&index.articles_by_tag(&tag)),
        None => output.print_tags(&index.tags()),
    }
    Ok(())
}
