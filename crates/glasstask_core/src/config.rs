//! Core runtime configuration.
//!
//! # Responsibility
//! - Resolve data directory, log level and backup interval.
//! - Apply `GLASSTASK_*` environment overrides on top of defaults.
//!
//! # Invariants
//! - Resolution is side-effect free; only `ensure_data_dir` touches disk.

use crate::logging::default_log_level;
use crate::service::backup_scheduler::DEFAULT_BACKUP_INTERVAL;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATA_DIR: &str = "GLASSTASK_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "GLASSTASK_LOG_LEVEL";
pub const ENV_BACKUP_INTERVAL_SECS: &str = "GLASSTASK_BACKUP_INTERVAL_SECS";

/// Folder created under the user's documents (or home) directory.
pub const APP_DIR_NAME: &str = "Glass Tasks";
const LOG_DIR_NAME: &str = "logs";

#[derive(Debug)]
pub enum ConfigError {
    /// Neither a documents nor a home directory could be determined.
    NoDefaultDataDir,
    /// Backup interval override is not a positive integer of seconds.
    InvalidBackupInterval(String),
    /// Data directory could not be created.
    CreateDataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDefaultDataDir => write!(
                f,
                "cannot determine a default data directory; set {ENV_DATA_DIR}"
            ),
            Self::InvalidBackupInterval(value) => write!(
                f,
                "invalid {ENV_BACKUP_INTERVAL_SECS} `{value}`; expected positive seconds"
            ),
            Self::CreateDataDir { path, source } => write!(
                f,
                "failed to create data directory `{}`: {source}",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDataDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub backup_interval: Duration,
}

impl CoreConfig {
    /// Configuration rooted at `data_dir` with default level and interval.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            log_level: default_log_level().to_string(),
            backup_interval: DEFAULT_BACKUP_INTERVAL,
        }
    }

    /// Resolves configuration from process environment and platform dirs.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), default_data_dir)
    }

    /// Resolves configuration from an arbitrary key lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        default_dir: impl FnOnce() -> Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let data_dir = match non_blank(lookup(ENV_DATA_DIR)) {
            Some(dir) => PathBuf::from(dir),
            None => default_dir().ok_or(ConfigError::NoDefaultDataDir)?,
        };
        let mut config = Self::with_data_dir(data_dir);

        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }
        if let Some(raw) = non_blank(lookup(ENV_BACKUP_INTERVAL_SECS)) {
            config.backup_interval = parse_interval(&raw)?;
        }
        Ok(config)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    /// Creates the data directory if needed.
    pub fn ensure_data_dir(&self) -> Result<&Path, ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::CreateDataDir {
            path: self.data_dir.clone(),
            source,
        })?;
        Ok(&self.data_dir)
    }
}

/// `<Documents>/Glass Tasks`, falling back to `<Home>/Glass Tasks`.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .map(|base| base.join(APP_DIR_NAME))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidBackupInterval(raw.to_string())),
    }
}
