//! Derived page command handlers

use anyhow::{Context, Result};

use quill_core::{ContentIndex, PageKind};

use crate::output::Output;

/// Render a derived page from the current index and print it
pub fn show(index: &ContentIndex, kind: PageKind, output: &Output) -> Result<()> {
    index
        .regenerate(kind)
        .with_context(|| format!("Failed to render the {} page", kind))?;

    let html = match kind {
        PageKind::Series => index.page_series(),
        PageKind::Archive => index.page_archives(),
    };
    output.print_html(&kind.to_string(), &html);
    Ok(())
}

/// Print the month-by-month archive listing
pub fn archives(index: &ContentIndex, output: &Output) -> Result<()> {
    output.print_archives(&index.archives());
    Ok(())
}
