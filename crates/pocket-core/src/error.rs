//! Error types for pocket-core

use pocket_client::ClientError;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Pre-flight failure; raised before any I/O against the service or stores
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The remote fetch failed (auth, transport or malformed response)
    #[error("Remote error: {0}")]
    Remote(#[from] ClientError),

    /// A store operation failed; records inserted before the failure remain
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Process exit code for this failure.
    ///
    /// Pre-flight configuration problems exit with 2 so wrappers can tell
    /// "never started" apart from "failed mid-run" (1).
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) => 2,
            SyncError::Remote(_) | SyncError::Store(_) => 1,
        }
    }
}

/// Configuration and pre-flight validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Consumer key or access token is empty
    #[error("missing \"Consumer Key\" and \"Access Token\" (set POCKET_CONSUMER_KEY and POCKET_ACCESS_TOKEN)")]
    MissingCredentials,

    /// A target table does not exist in the database
    #[error("missing \"{0}\" table")]
    MissingStore(String),

    /// The database file does not exist
    #[error("missing database \"{0}\" (run `pocket init`)")]
    MissingDatabase(String),

    /// Required field is missing
    #[error("missing field: {0}")]
    MissingField(String),

    /// Value is out of range or malformed
    #[error("invalid value: {0}")]
    Invalid(String),

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// Config file could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_two() {
        let err = SyncError::from(ConfigError::MissingCredentials);
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Consumer Key"));
    }

    #[test]
    fn runtime_errors_exit_with_one() {
        let err = SyncError::from(ClientError::Network("connection reset".into()));
        assert_eq!(err.exit_code(), 1);

        let err = SyncError::from(StoreError::AlreadyExists("42".into()));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_database_is_preflight() {
        let err = SyncError::from(ConfigError::MissingDatabase("/srv/pocket.db".into()));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("/srv/pocket.db"));
    }

    #[test]
    fn missing_store_names_table() {
        let err = ConfigError::MissingStore("pocket_tags".into());
        assert_eq!(err.to_string(), "missing \"pocket_tags\" table");
    }
}
