//! Error types for cache operations
//!
//! Loads never surface these: every retrieval failure degrades to a miss.
//! Saves return them for anything that is not a benign write race.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem error while writing a durable mirror
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML snapshot could not be encoded or decoded
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite error other than a duplicate key on insert
    #[error("Database error: {0}")]
    Database(#[from] r2d2_sqlite::rusqlite::Error),

    /// Connection pool could not hand out a connection
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// External key-value store failure
    #[error("Store error: {0}")]
    Store(String),

    /// A snapshot file exists but does not hold a key/value mapping
    #[error("Corrupt cache file {}: {reason}", .path.display())]
    CorruptCache { path: PathBuf, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(e: tokio::task::JoinError) -> Self {
        CacheError::Other(format!("blocking task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::Store("connection refused".to_string());
        assert_eq!(error.to_string(), "Store error: connection refused");

        let corrupt = CacheError::CorruptCache {
            path: PathBuf::from("/tmp/cache.yaml"),
            reason: "root is a sequence".to_string(),
        };
        let message = corrupt.to_string();
        assert!(message.contains("/tmp/cache.yaml"));
        assert!(message.contains("root is a sequence"));

        let config = CacheError::ConfigError("path is required".to_string());
        assert!(config.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_error_conversion() {
        let error: CacheError = "test error".into();
        assert!(matches!(error, CacheError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: CacheError = io.into();
        assert!(matches!(error, CacheError::Io(_)));
    }
}
