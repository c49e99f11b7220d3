//! Status command handler

use anyhow::Result;

use quill_core::{Config, ContentIndex};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(index: &ContentIndex, config: &Config, in_memory: bool, output: &Output) -> Result<()> {
    let state = index.snapshot();
    let published = state.page(1, 1).total_pages;
    let static_pages = index.article_count().saturating_sub(published);
    let drafts = index.drafts()?.len();
    let trash = index.trash()?.len();
    let storage = if in_memory {
        "(in memory)".to_string()
    } else {
        config.sqlite_path().display().to_string()
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "storage": storage,
                    "start_id": config.start_id,
                    "counts": {
                        "published": published,
                        "static_pages": static_pages,
                        "drafts": drafts,
                        "trash": trash,
                        "series": state.series().len(),
                        "tags": state.tags().len(),
                        "months": state.archives().len()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", published);
        }
        OutputFormat::Human => {
            println!("Quill Status");
            println!("============");
            println!();
            println!("Storage:");
            println!("  Location: {}", storage);
            println!("  Start ID: {}", config.start_id);
            println!();
            println!("Contents:");
            println!("  Published:    {}", published);
            println!("  Static pages: {}", static_pages);
            println!("  Drafts:       {}", drafts);
            println!("  Trash:        {}", trash);
            println!();
            println!("Index:");
            println!("  Series: {}", state.series().len());
            println!("  Tags:   {}", state.tags().len());
            println!("  Months: {}", state.archives().len());
        }
    }

    Ok(())
}
