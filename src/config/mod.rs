//! Configuration management for pkgstore

pub mod schema;

pub use schema::{CaseCheck, Config};

use crate::error::{StoreError, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pkgstore")
            .join("config.toml")
    }

    /// Default store root
    pub fn default_store_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pkgstore")
            .join("data")
    }

    /// Default download cache folder
    pub fn default_download_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pkgstore")
            .join("downloads")
    }

    /// Store root from `config`, falling back to the default
    pub fn store_path(config: &Config) -> PathBuf {
        config
            .storage
            .path
            .clone()
            .unwrap_or_else(Self::default_store_path)
    }

    /// Download cache folder from `config`, falling back to the default
    pub fn download_path(config: &Config) -> PathBuf {
        config
            .download_cache
            .path
            .clone()
            .unwrap_or_else(Self::default_download_path)
    }

    /// Load configuration, using defaults if the file does not exist
    pub fn load(&self) -> StoreResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, path: &Path) -> StoreResult<Config> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| StoreError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> StoreResult<()> {
        self.ensure_config_dir()?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).map_err(|e| {
            StoreError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    fn ensure_config_dir(&self) -> StoreResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
