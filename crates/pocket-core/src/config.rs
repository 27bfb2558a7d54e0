//! Configuration for a sync run
//!
//! A [`SyncConfig`] is built once at process start (credentials from the
//! environment pairs handed in, everything else from an optional TOML file)
//! and passed by reference to every component.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use pocket_client::{ClientConfig, Credentials};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::validate_table_name;

/// Record cap for a full resync
pub const FULL_LIMIT: u32 = 10_000;

/// Incremental window when none is given
pub const DEFAULT_DAYS: u32 = 7;

/// How many of the newest records a tag refresh reads
pub const DEFAULT_TAG_REFRESH_LIMIT: u32 = 20;

/// Widest incremental window accepted (about a century)
pub const MAX_DAYS: u32 = 36_500;

const APP_DIR: &str = "pocket-connector";

/// Where the items and tags live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreTarget {
    /// SQLite database file
    pub database: PathBuf,
    pub items_table: String,
    pub tags_table: String,
}

impl Default for StoreTarget {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            items_table: "items".to_string(),
            tags_table: "tags".to_string(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("pocket.db"))
        .unwrap_or_else(|| PathBuf::from("pocket.db"))
}

/// On-disk configuration file. Credentials are never read from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub store: StoreTarget,
    pub api: ClientConfig,
}

impl FileConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Everything a run needs besides its per-run options.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub credentials: Credentials,
    pub store: StoreTarget,
    pub api: ClientConfig,
}

impl SyncConfig {
    pub fn new(credentials: Credentials, file: FileConfig) -> Self {
        Self {
            credentials,
            store: file.store,
            api: file.api,
        }
    }

    /// `<config dir>/pocket-connector/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Build the configuration from an optional file and environment pairs.
    pub fn load<I, K, V>(path: Option<&Path>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let file = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::new(Credentials::from_env_map(env), file))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.credentials.is_complete() {
            return Err(ConfigError::MissingCredentials);
        }
        for table in [&self.store.items_table, &self.store.tags_table] {
            validate_table_name(table)
                .map_err(|_| ConfigError::Invalid(format!("table name {:?}", table)))?;
        }
        if self.store.database.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("store.database".to_string()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("api.base_url".to_string()));
        }
        Ok(())
    }
}

/// How records are requested and reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncMode {
    /// Up to `limit` newest records, inserted without diffing
    Full { limit: u32 },
    /// Records changed in the last `days` days, diffed by item id
    Incremental { days: u32 },
}

impl SyncMode {
    pub fn is_full(&self) -> bool {
        matches!(self, SyncMode::Full { .. })
    }

    /// Cutoff for an incremental fetch relative to `now`.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SyncMode::Full { .. } => None,
            SyncMode::Incremental { days } => Some(
                now.checked_sub_signed(Duration::days(i64::from(*days)))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full { limit } => write!(f, "full (limit {})", limit),
            SyncMode::Incremental { days } => write!(f, "incremental (last {} days)", days),
        }
    }
}

/// Per-run options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Owner attached to every item and tag
    pub user_id: Option<String>,
    pub days: u32,
    pub full: bool,
    pub limit: u32,
    /// Truncate both stores before importing
    pub wipe: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            days: DEFAULT_DAYS,
            full: false,
            limit: FULL_LIMIT,
            wipe: false,
        }
    }
}

impl SyncOptions {
    pub fn full() -> Self {
        Self {
            full: true,
            ..Self::default()
        }
    }

    pub fn incremental(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_wipe(mut self, wipe: bool) -> Self {
        self.wipe = wipe;
        self
    }

    pub fn mode(&self) -> SyncMode {
        if self.full {
            SyncMode::Full { limit: self.limit }
        } else {
            SyncMode::Incremental { days: self.days }
        }
    }

    /// Both stores are truncated for a full run or an explicit wipe.
    pub fn wipes(&self) -> bool {
        self.full || self.wipe
    }

    pub fn user(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|u| !u.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days == 0 {
            return Err(ConfigError::Invalid("days must be positive".to_string()));
        }
        if self.days > MAX_DAYS {
            return Err(ConfigError::Invalid(format!(
                "days must be at most {}",
                MAX_DAYS
            )));
        }
        if self.limit == 0 {
            return Err(ConfigError::Invalid("limit must be positive".to_string()));
        }
        Ok(())
    }
}
