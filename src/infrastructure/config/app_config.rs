//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::args::CliArgs;
use crate::infrastructure::image::{
    DEFAULT_MAX_BYTES, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_ENTRIES, MemoryBudget,
    default_cache_dir,
};
use crate::infrastructure::subsonic::SubsonicClientConfig;

pub(crate) const APP_NAME: &str = "sonicart";
pub(crate) const APP_QUALIFIER: &str = "org";
pub(crate) const APP_ORGANIZATION: &str = "sonicart";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI flags.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Music server connection.
    #[serde(default)]
    pub server: ServerConfig,

    /// Cover cache tuning.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Music server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server root URL.
    #[serde(default)]
    pub url: String,

    /// Account name (`u`).
    #[serde(default)]
    pub username: String,

    /// Salted password token.
    #[serde(default)]
    pub token: String,

    /// Salt the token was derived with.
    #[serde(default)]
    pub salt: String,

    /// Client name reported to the server.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// Returns true once a server URL is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// HTTP client settings for this server.
    #[must_use]
    pub fn client_config(&self) -> SubsonicClientConfig {
        SubsonicClientConfig {
            base_url: self.url.clone(),
            username: self.username.clone(),
            token: self.token.clone(),
            salt: self.salt.clone(),
            client_name: self.client_name.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            token: String::new(),
            salt: String::new(),
            client_name: default_client_name(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Cover cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum decoded covers kept in memory.
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: usize,

    /// Maximum decoded bytes kept in memory.
    #[serde(default = "default_memory_max_bytes")]
    pub memory_max_bytes: usize,

    /// Maximum encoded bytes kept on disk.
    #[serde(default = "default_disk_max_bytes")]
    pub disk_max_bytes: u64,

    /// Disk cache directory. Defaults to the user cache directory.
    #[serde(default)]
    pub disk_dir: Option<PathBuf>,

    /// Maximum concurrent downloads.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Stagger delay added per batch position, in milliseconds.
    #[serde(default = "default_stagger_step_ms")]
    pub stagger_step_ms: u64,

    /// Upper bound of the stagger delay, in milliseconds.
    #[serde(default = "default_stagger_max_ms")]
    pub stagger_max_ms: u64,

    /// Buffered state events per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl CacheConfig {
    /// Memory cache budget from the entry and byte limits.
    #[must_use]
    pub const fn memory_budget(&self) -> MemoryBudget {
        MemoryBudget {
            max_entries: self.memory_max_entries,
            max_bytes: self.memory_max_bytes,
        }
    }

    /// Stagger delay per batch position.
    #[must_use]
    pub const fn stagger_step(&self) -> Duration {
        Duration::from_millis(self.stagger_step_ms)
    }

    /// Longest stagger delay.
    #[must_use]
    pub const fn stagger_max(&self) -> Duration {
        Duration::from_millis(self.stagger_max_ms)
    }

    /// Configured disk cache directory, or the platform default.
    #[must_use]
    pub fn effective_disk_dir(&self) -> PathBuf {
        self.disk_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_entries: default_memory_max_entries(),
            memory_max_bytes: default_memory_max_bytes(),
            disk_max_bytes: default_disk_max_bytes(),
            disk_dir: None,
            max_concurrent_downloads: default_max_concurrent_downloads(),
            stagger_step_ms: default_stagger_step_ms(),
            stagger_max_ms: default_stagger_max_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_client_name() -> String {
    APP_NAME.to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_memory_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

const fn default_memory_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}

const fn default_disk_max_bytes() -> u64 {
    DEFAULT_MAX_CACHE_SIZE
}

const fn default_max_concurrent_downloads() -> usize {
    4
}

const fn default_stagger_step_ms() -> u64 {
    30
}

const fn default_stagger_max_ms() -> u64 {
    600
}

const fn default_event_capacity() -> usize {
    256
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(url) = &args.server_url {
            self.server.url.clone_from(url);
        }
        if let Some(username) = &args.username {
            self.server.username.clone_from(username);
        }
        if let Some(token) = &args.token {
            self.server.token.clone_from(token);
        }
        if let Some(salt) = &args.salt {
            self.server.salt.clone_from(salt);
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache.disk_dir = Some(cache_dir.clone());
        }
    }
}
