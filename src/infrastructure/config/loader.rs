//! Locating, creating and validating `config.toml`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;
use tracing::{debug, info};

use super::app_config::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER, AppConfig, CacheConfig};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no config directory for this user.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,

    /// A config file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid configuration.
    #[error("{}: {source}", path.display())]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// The default configuration could not be rendered.
    #[error("failed to render default config: {0}")]
    Render(#[from] toml::ser::Error),

    /// The `[cache]` section describes budgets the caches cannot honour.
    #[error("invalid [cache] section: {0}")]
    InvalidCache(String),
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Finds and reads the configuration file.
///
/// Without an explicit path the file lives in the platform config
/// directory and is created with defaults on first run. An explicit path
/// must already exist.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Loader rooted at the platform config directory.
    ///
    /// # Errors
    /// Returns `ConfigError::ConfigDirNotFound` if no home directory is known.
    pub fn new() -> Result<Self, ConfigError> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| Self::with_dir(dirs.config_dir().to_path_buf()))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Loader rooted at `config_dir`.
    #[must_use]
    pub const fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Where the configuration is read from when no path is given.
    #[must_use]
    pub fn default_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Reads and validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or written, does not
    /// parse, or carries unusable cache budgets.
    pub fn load(&self, path_override: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let config = match path_override {
            Some(path) => read_config(path)?,
            None => {
                let path = self.default_path();
                if path.exists() {
                    read_config(&path)?
                } else {
                    write_default(&path)?
                }
            }
        };

        validate_cache(&config.cache)?;
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

fn write_default(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = AppConfig::default();
    let rendered = toml::to_string_pretty(&config)?;

    let dir = path
        .parent()
        .ok_or_else(|| ConfigError::io(path, std::io::Error::other("no parent directory")))?;
    fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;

    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| ConfigError::io(dir, e))?;
    staged
        .write_all(rendered.as_bytes())
        .map_err(|e| ConfigError::io(path, e))?;
    staged
        .persist(path)
        .map_err(|e| ConfigError::io(path, e.error))?;

    info!(path = %path.display(), "Wrote default configuration");
    Ok(config)
}

/// The disk tier must be able to hold at least what memory holds.
fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    let problem = if cache.memory_max_entries == 0 || cache.memory_max_bytes == 0 {
        "memory budget must be non-zero"
    } else if cache.disk_max_bytes == 0 {
        "disk_max_bytes must be non-zero"
    } else if cache.disk_max_bytes < cache.memory_max_bytes as u64 {
        "disk_max_bytes must be at least memory_max_bytes"
    } else if cache.max_concurrent_downloads == 0 {
        "max_concurrent_downloads must be non-zero"
    } else if cache.stagger_max_ms < cache.stagger_step_ms {
        "stagger_max_ms must not be below stagger_step_ms"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidCache(problem.to_string()))
}
