//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/quill/config.toml)
//! 3. Environment variables (QUILL_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::index::IndexSettings;

/// Environment variable prefix
const ENV_PREFIX: &str = "QUILL";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Visibility boundary: ids below this are static pages
    #[serde(default = "default_start_id")]
    pub start_id: i64,

    /// Articles per listing page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Regex marking the end of an excerpt in rendered content
    #[serde(default = "default_excerpt_marker")]
    pub excerpt_marker: String,

    /// Excerpt length in characters when no marker is present
    #[serde(default = "default_excerpt_length")]
    pub excerpt_length: usize,

    /// Leading line prefix that turns the first line into a description
    #[serde(default = "default_description_prefix")]
    pub description_prefix: String,

    /// Markdown placed above the series listing
    #[serde(default)]
    pub series_intro: String,

    /// Markdown placed above the archive listing
    #[serde(default)]
    pub archives_intro: String,

    /// Author recorded on new articles and seeded pages
    #[serde(default)]
    pub author: String,

    /// How long trashed articles are kept before purging
    #[serde(default = "default_trash_retention_hours")]
    pub trash_retention_hours: u64,

    /// How often the trash sweep runs
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            start_id: default_start_id(),
            page_size: default_page_size(),
            excerpt_marker: default_excerpt_marker(),
            excerpt_length: default_excerpt_length(),
            description_prefix: default_description_prefix(),
            series_intro: String::new(),
            archives_intro: String::new(),
            author: String::new(),
            trash_retention_hours: default_trash_retention_hours(),
            sweep_interval_hours: default_sweep_interval_hours(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (QUILL_DATA_DIR, QUILL_START_ID, QUILL_PAGE_SIZE, QUILL_AUTHOR)
    /// 2. Config file (~/.config/quill/config.toml or QUILL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Unparseable numbers are ignored
        if let Ok(val) = std::env::var(format!("{}_START_ID", ENV_PREFIX)) {
            if let Ok(start_id) = val.trim().parse() {
                self.start_id = start_id;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_PAGE_SIZE", ENV_PREFIX)) {
            if let Ok(page_size) = val.trim().parse() {
                self.page_size = page_size;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_AUTHOR", ENV_PREFIX)) {
            self.author = val;
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with QUILL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("quill.db")
    }

    /// Index settings derived from this configuration
    pub fn settings(&self) -> IndexSettings {
        IndexSettings {
            start_id: self.start_id,
            excerpt_marker: self.excerpt_marker.clone(),
            excerpt_length: self.excerpt_length,
            description_prefix: self.description_prefix.clone(),
            series_intro: self.series_intro.clone(),
            archives_intro: self.archives_intro.clone(),
        }
    }

    pub fn trash_retention(&self) -> Duration {
        Duration::from_secs(self.trash_retention_hours * 3600)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_hours.max(1) * 3600)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
}

fn default_start_id() -> i64 {
    11
}

fn default_page_size() -> usize {
    10
}

fn default_excerpt_marker() -> String {
    "<!--more-->".to_string()
}

fn default_excerpt_length() -> usize {
    200
}

fn default_description_prefix() -> String {
    "Desc:".to_string()
}

fn default_trash_retention_hours() -> u64 {
    48
}

fn default_sweep_interval_hours() -> u64 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "QUILL_DATA_DIR",
        "QUILL_START_ID",
        "QUILL_PAGE_SIZE",
        "QUILL_AUTHOR",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.start_id, 11);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.excerpt_marker, "<!--more-->");
        assert!(config.data_dir.ends_with("quill"));
        assert!(config.sqlite_path().ends_with("quill.db"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("QUILL_DATA_DIR", "/tmp/quill-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/quill-test"));
    }

    #[test]
    fn test_env_override_numbers() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("QUILL_START_ID", "100");
        env::set_var("QUILL_PAGE_SIZE", " 25 ");
        config.apply_env_overrides();
        assert_eq!(config.start_id, 100);
        assert_eq!(config.page_size, 25);

        env::set_var("QUILL_START_ID", "not-a-number");
        config.apply_env_overrides();
        assert_eq!(config.start_id, 100);
    }

    #[test]
    fn test_load_from_str_fills_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            start_id = 1000
            series_intro = "All series"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.start_id, 1000);
        assert_eq!(config.series_intro, "All series");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.trash_retention_hours, 48);

        let settings = config.settings();
        assert_eq!(settings.start_id, 1000);
        assert_eq!(settings.series_intro, "All series");
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/quill"),
            author: "deep".to_string(),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("start_id"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.author, "deep");
    }

    #[test]
    fn test_durations() {
        let config = Config {
            trash_retention_hours: 2,
            sweep_interval_hours: 0,
            ..Config::default()
        };
        assert_eq!(config.trash_retention(), Duration::from_secs(7200));
        assert_eq!(config.sweep_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("QUILL_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.start_id, 11);
        assert!(config.data_dir.exists());
    }
}
