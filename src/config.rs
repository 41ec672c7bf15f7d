//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILDEX_CONFIG` (environment variable)
//! 2. `~/.config/maildex/config.toml` (Linux/macOS)
//!    `%APPDATA%\maildex\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mailbox scanning behavior.
    pub scan: ScanConfig,
    /// Persistent header cache.
    pub header_cache: HeaderCacheConfig,
    /// MH sequence names.
    pub mh: MhConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for header caches and logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mailbox scanning behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Flagged messages can't be trashed by a `T` in their filename.
    pub flag_safe: bool,
    /// Messages found in a Maildir `cur/` are marked old.
    pub mark_old: bool,
    /// Index sort: "order" keeps MH messages in natural (arrival) order;
    /// any other value leaves them in inode order.
    pub sort: String,
    /// Report progress while scanning.
    pub verbose: bool,
    /// Look for new mail when checking an open mailbox.
    pub check_new: bool,
}

/// Persistent header cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderCacheConfig {
    /// Use the header cache at all.
    pub enabled: bool,
    /// Cache file, or directory holding one file per mailbox.
    /// Defaults to `<cache_dir>/headers/`.
    pub path: Option<PathBuf>,
    /// Reject cache entries older than the message file.
    pub verify: bool,
}

/// Names of the MH sequences that carry message flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MhConfig {
    pub seq_unseen: String,
    pub seq_flagged: String,
    pub seq_replied: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            flag_safe: false,
            mark_old: true,
            sort: "date".to_string(),
            verbose: true,
            check_new: true,
        }
    }
}

impl ScanConfig {
    /// Whether MH mailboxes are kept in natural (path) order.
    pub fn natural_order(&self) -> bool {
        self.sort == "order"
    }
}

impl Default for HeaderCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            verify: true,
        }
    }
}

impl Default for MhConfig {
    fn default() -> Self {
        Self {
            seq_unseen: "unseen".to_string(),
            seq_flagged: "flagged".to_string(),
            seq_replied: "replied".to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Read the configuration file, falling back to defaults when there is
/// none or it cannot be used.
pub fn load_config() -> Config {
    let Some(path) = config_file_path().filter(|p| p.exists()) else {
        return Config::default();
    };
    match read_config(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
            Config::default()
        }
    }
}

/// Parse the TOML configuration at `path`.
pub fn read_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Write `config` to `path` as TOML, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(config)?)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILDEX_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("maildex").join("config.toml"))
}

/// Return the cache directory for header caches, logs, etc.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("maildex")
}

/// Where header caches live: the configured path, or a directory under
/// [`cache_dir`]. A directory holds one cache file per mailbox.
pub fn header_cache_path(config: &Config) -> PathBuf {
    match config.header_cache.path {
        Some(ref p) => p.clone(),
        None => cache_dir(config).join("headers/"),
    }
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("maildex.log")
}
