//! Error types for herdcache
//!
//! All modules use `HerdResult<T>` as their return type. `HerdError` is
//! `Clone` because a single producer outcome is handed to every caller that
//! waited on it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for herdcache operations
pub type HerdResult<T> = Result<T, HerdError>;

/// All errors that can occur in herdcache
#[derive(Error, Debug, Clone)]
pub enum HerdError {
    // Read path errors
    #[error("Record not found: {key}")]
    NotFound { key: String },

    #[error("{backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Deadline of {timeout:?} exceeded waiting for {key}")]
    DeadlineExceeded { key: String, timeout: Duration },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Producer for {key} terminated without a result")]
    Abandoned { key: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl HerdError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Create a backend-unavailable error for a named collaborator
    pub fn backend(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a not-found error for a key
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::DeadlineExceeded { .. } | Self::Abandoned { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BackendUnavailable { .. } => Some("Check that the cache and store are reachable"),
            Self::DeadlineExceeded { .. } => Some("Raise coalesce.wait_timeout_ms or unset it"),
            Self::ConfigInvalid { .. } => Some("Run: herdcache config init --force"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HerdError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<toml::ser::Error> for HerdError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Encoding(format!("TOML serialize error: {}", e))
    }
}
