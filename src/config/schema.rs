//! Configuration schema for pkgstore
//!
//! Configuration is stored at `~/.config/pkgstore/config.toml`

use crate::lock::LockOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Local store settings
    pub storage: StorageConfig,

    /// Folder lock settings
    pub locks: LocksConfig,

    /// Download cache settings
    pub download_cache: DownloadCacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

impl GeneralConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// When to reject references whose folders only match case-insensitively
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseCheck {
    /// Only on platforms whose default filesystems ignore case
    #[default]
    Auto,
    Always,
    Never,
}

impl CaseCheck {
    pub fn enabled(self) -> bool {
        match self {
            Self::Auto => cfg!(any(target_os = "macos", target_os = "windows")),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Local store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store root (default: `<data_local_dir>/pkgstore/data`)
    pub path: Option<PathBuf>,

    /// Case collision check
    pub case_check: CaseCheck,
}

/// Folder lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocksConfig {
    /// Disable to run without any folder locking
    pub enabled: bool,

    /// Polling delay while waiting for a read lock
    pub read_busy_delay_ms: u64,

    /// Polling delay while waiting for a write lock
    pub write_busy_delay_ms: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        let defaults = LockOptions::default();
        Self {
            enabled: defaults.enabled,
            read_busy_delay_ms: defaults.read_delay.as_millis() as u64,
            write_busy_delay_ms: defaults.write_delay.as_millis() as u64,
        }
    }
}

impl LocksConfig {
    pub fn options(&self) -> LockOptions {
        LockOptions {
            enabled: self.enabled,
            read_delay: Duration::from_millis(self.read_busy_delay_ms),
            write_delay: Duration::from_millis(self.write_busy_delay_ms),
            max_attempts: None,
        }
    }
}

/// Download cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadCacheConfig {
    /// Reuse downloads across fetches (default: true)
    pub enabled: bool,

    /// Cache folder (default: `<cache_dir>/pkgstore/downloads`)
    pub path: Option<PathBuf>,
}

impl Default for DownloadCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}
