//! Configuration management for the archive mirror.
//!
//! Loads configuration from a TOML file, fills every optional key with its
//! default and validates the result once before any remote work starts.
//! The remote password may be supplied through `ARCHIVE_MIRROR_PASSWORD`
//! instead of the file.

use crate::archive::IgnoreList;
use crate::utils::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `remote.password`.
pub const PASSWORD_ENV: &str = "ARCHIVE_MIRROR_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// FTP server host name or address
    pub host: String,

    /// FTP control port
    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Remote directory the archives are mirrored into
    pub directory: String,

    /// Socket read/write timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection attempts before giving up
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Delay between connection attempts in seconds
    #[serde(default = "default_connect_retry_delay_secs")]
    pub connect_retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory holding the produced archive volumes
    pub source_dir: PathBuf,

    /// File with one ignore pattern per line
    #[serde(default = "default_ignore_file")]
    pub ignore_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Successful sets kept on the remote side
    #[serde(default = "default_max_copies")]
    pub max_copies: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Upload attempts per volume
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file, written in addition to stdout
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Size in MB above which the log file is rolled over at start-up
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Rolled-over generations to keep
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,
}

// Default values
fn default_port() -> u16 {
    21
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_retries() -> u32 {
    3
}

fn default_connect_retry_delay_secs() -> u64 {
    5
}

fn default_ignore_file() -> PathBuf {
    PathBuf::from(".ftpignore")
}

fn default_max_copies() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_size_mb() -> u64 {
    10
}

fn default_backup_count() -> usize {
    10
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_copies: default_max_copies(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            max_size_mb: default_max_size_mb(),
            backup_count: default_backup_count(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_secs)
    }
}

impl LocalConfig {
    /// Read the ignore file. A missing file yields an empty list.
    pub fn load_ignore_list(&self) -> Result<IgnoreList> {
        if !self.ignore_file.exists() {
            return Ok(IgnoreList::default());
        }
        let content = std::fs::read_to_string(&self.ignore_file)?;
        Ok(IgnoreList::parse(&content))
    }
}

impl LogConfig {
    /// Directory the log files live in (`log` when no file is configured).
    pub fn log_dir(&self) -> PathBuf {
        self.file
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("log"))
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MirrorError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            config.remote.password = password;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without validating it
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check every field the run depends on
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("remote.host", self.remote.host.as_str()),
            ("remote.username", self.remote.username.as_str()),
            ("remote.password", self.remote.password.as_str()),
            ("remote.directory", self.remote.directory.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(MirrorError::Config(format!("{} must not be empty", key)));
            }
        }
        if self.local.source_dir.as_os_str().is_empty() {
            return Err(MirrorError::Config("local.source_dir must not be empty".into()));
        }
        if self.retention.max_copies == 0 {
            return Err(MirrorError::Config("retention.max_copies must be at least 1".into()));
        }
        if self.transfer.max_attempts == 0 {
            return Err(MirrorError::Config("transfer.max_attempts must be at least 1".into()));
        }
        if self.remote.connect_retries == 0 {
            return Err(MirrorError::Config("remote.connect_retries must be at least 1".into()));
        }
        if self.remote.timeout_secs == 0 {
            return Err(MirrorError::Config("remote.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}
