//! Series command handlers

use anyhow::{Context, Result};

use quill_core::{ContentIndex, SerieId};

use crate::output::Output;

/// Create a series
pub fn add(
    index: &ContentIndex,
    name: String,
    slug: String,
    description: String,
    output: &Output,
) -> Result<()> {
    let serie = index
        .add_serie(name, slug, description)
        .context("Failed to create series")?;
    output.success(&format!("Created series {} ({})", serie.id, serie.name));
    Ok(())
}

/// Change a series' name, slug or description
pub fn update(
    index: &ContentIndex,
    id: i64,
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut serie = index.query_serie(SerieId(id))?.serie;
    if let Some(name) = name {
        serie.name = name;
    }
    if let Some(slug) = slug {
        serie.slug = slug;
    }
    if let Some(description) = description {
        serie.description = description;
    }

    let serie = index
        .update_serie(serie)
        .context("Failed to update series")?;
    output.success(&format!("Updated series {}", serie.id));
    Ok(())
}

/// Delete an empty series
pub fn delete(index: &ContentIndex, id: i64, output: &Output) -> Result<()> {
    index
        .del_serie(SerieId(id))
        .context("Failed to delete series")?;
    output.success(&format!("Deleted series {}", id));
    Ok(())
}

/// List series, or the articles of one series
pub fn list(index: &ContentIndex, id: Option<i64>, output: &Output) -> Result<()> {
    match id {
        Some(id) => {
            let view = index.query_serie(SerieId(id))?;
            output.message(&format!("{}: {}", view.serie.name, view.serie.description));
            output.print_listed(&view.articles);
        }
        None => output.print_series(&index.series()),
    }
    Ok(())
}
