//! Config command handlers

use anyhow::{bail, Context, Result};

use quill_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to encode configuration")?
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:              {}", config.data_dir.display());
            println!("  start_id:              {}", config.start_id);
            println!("  page_size:             {}", config.page_size);
            println!("  excerpt_marker:        {}", config.excerpt_marker);
            println!("  excerpt_length:        {}", config.excerpt_length);
            println!("  description_prefix:    {}", config.description_prefix);
            println!("  author:                {}", or_unset(&config.author));
            println!("  series_intro:          {}", or_unset(&config.series_intro));
            println!("  archives_intro:        {}", or_unset(&config.archives_intro));
            println!("  trash_retention_hours: {}", config.trash_retention_hours);
            println!("  sweep_interval_hours:  {}", config.sweep_interval_hours);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => config.data_dir = value.clone().into(),
        "start_id" => {
            config.start_id = value
                .parse()
                .context("Invalid value for start_id. Use an integer.")?;
        }
        "page_size" => {
            config.page_size = value
                .parse()
                .context("Invalid value for page_size. Use a positive integer.")?;
        }
        "excerpt_marker" => config.excerpt_marker = value.clone(),
        "excerpt_length" => {
            config.excerpt_length = value
                .parse()
                .context("Invalid value for excerpt_length. Use a positive integer.")?;
        }
        "description_prefix" => config.description_prefix = value.clone(),
        "author" => config.author = value.clone(),
        "series_intro" => config.series_intro = value.clone(),
        "archives_intro" => config.archives_intro = value.clone(),
        "trash_retention_hours" => {
            config.trash_retention_hours = value
                .parse()
                .context("Invalid value for trash_retention_hours. Use a number of hours.")?;
        }
        "sweep_interval_hours" => {
            config.sweep_interval_hours = value
                .parse()
                .context("Invalid value for sweep_interval_hours. Use a number of hours.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, start_id, page_size, excerpt_marker, excerpt_length, \
                 description_prefix, author, series_intro, archives_intro, \
                 trash_retention_hours, sweep_interval_hours",
                key
            );
        }
    }

    config.save().context("Failed to save configuration")?;
    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
