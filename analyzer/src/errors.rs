//! Analyzer error types
//!
//! Snapshot problems that still leave a usable document (missing keys, wrong
//! shapes) are not errors: they are absorbed by the record model and show up
//! as failing integrity checks. Everything here is a hard failure of one
//! operation.

use std::path::PathBuf;

use thiserror::Error;

/// Error category for structured logging and exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration file unreadable or invalid
    ConfigError,
    /// Snapshot document absent, unreadable or not JSON
    SnapshotError,
    /// Building the in-memory relational store failed
    StoreError,
    /// A catalog or ad-hoc query could not run
    QueryError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::SnapshotError => "SNAPSHOT_ERROR",
            Self::StoreError => "STORE_ERROR",
            Self::QueryError => "QUERY_ERROR",
        }
    }

    /// Whether the session can keep serving requests after this error
    pub fn recoverable(self) -> bool {
        matches!(self, Self::QueryError)
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("snapshot not found at {}", path.display())]
    SnapshotNotFound { path: PathBuf },

    #[error("failed to read snapshot at {}", path.display())]
    SnapshotRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot is not valid JSON")]
    SnapshotParse {
        #[source]
        source: serde_json::Error,
    },

    #[error("store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("query failed: {message}")]
    QueryFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl AnalyzerError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::SnapshotNotFound { .. }
            | Self::SnapshotRead { .. }
            | Self::SnapshotParse { .. } => ErrorCategory::SnapshotError,
            Self::Store { .. } => ErrorCategory::StoreError,
            Self::QueryFailed { .. } => ErrorCategory::QueryError,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a store error with source
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query error with source
    pub fn query_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::QueryFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Message plus the underlying cause, for one-line display
    pub fn detail(&self) -> String {
        match std::error::Error::source(self) {
            Some(source) => format!("{self}: {source}"),
            None => self.to_string(),
        }
    }
}

/// Result type for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;
