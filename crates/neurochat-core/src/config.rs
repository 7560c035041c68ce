//! Configuration types and loading for neurochat.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::Result;
use crate::models::DEFAULT_TITLE;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the conversation database.
    pub database: PathBuf,

    /// Directory exports are written to.
    pub export_dir: PathBuf,

    /// Default number of conversations shown by `list`.
    pub list_limit: i64,

    /// Title given to conversations created without one.
    pub default_title: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME);

        let export_dir = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            database: data_dir.join("neurochat.db"),
            export_dir,
            list_limit: 100,
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file, or defaults if absent.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::default().resolve()
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.resolve()
    }

    /// Get the default config file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME)
            .join("config.toml")
    }

    /// Save configuration to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure config exists at the given path, creating defaults if missing.
    pub fn ensure_at(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            config.resolve()
        }
    }

    /// Expand a path, replacing ~ with home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::full(path)
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(expanded)
    }

    /// Expand paths, apply environment overrides and validate. Shared final
    /// step of every loader.
    fn resolve(mut self) -> Result<Self> {
        self.expand_paths();
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    fn expand_paths(&mut self) {
        self.database = Self::expand_path(&self.database.to_string_lossy());
        self.export_dir = Self::expand_path(&self.export_dir.to_string_lossy());
    }

    /// `<PREFIX>_DATABASE` and `<PREFIX>_EXPORT_DIR` take precedence over the file.
    fn apply_env_overrides(&mut self) {
        let prefix = crate::env_prefix();
        if let Ok(database) = std::env::var(format!("{prefix}_DATABASE")) {
            self.database = Self::expand_path(&database);
        }
        if let Ok(export_dir) = std::env::var(format!("{prefix}_EXPORT_DIR")) {
            self.export_dir = Self::expand_path(&export_dir);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.list_limit <= 0 {
            return Err(Error::Config(format!(
                "list_limit must be positive, got {}",
                self.list_limit
            )));
        }
        if self.default_title.trim().is_empty() {
            return Err(Error::Config("default_title must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
