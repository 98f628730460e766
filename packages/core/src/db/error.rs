//! Local Cache Error Types
//!
//! This module defines error types for the local cache layer, covering
//! connection, initialization, query, and (de)serialization failures.

use std::path::PathBuf;
use thiserror::Error;

/// Local cache operation errors
///
/// Cache failures never abort a store mutation: callers log the error and
/// continue with the in-memory state (the mirror degrades, the map does
/// not).
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to open the cache database file
    #[error("Failed to open local cache at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to create parent directory for the cache file
    #[error("Failed to create parent directory for local cache: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Cache operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("Cache SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// Cached payload could not be (de)serialized
    #[error("Cache serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl CacheError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }
}
