//! Error types for the TMA toolkit.

use thiserror::Error;

/// Result type alias using the TMA error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for TMA components.
#[derive(Error, Debug)]
pub enum Error {
    /// Pool tier outside {1, 2, 3}
    #[error("Invalid pool level {0}: expected one of 1, 2, 3")]
    InvalidLevel(i64),

    /// Snapshot or history file unreadable/corrupt
    #[error("Storage error: {0}")]
    Storage(String),

    /// Performance check on a tier with no members
    #[error("Pool tier {0} has no members")]
    EmptyTier(u8),

    /// Failure reported by an external data source
    #[error(transparent)]
    Collector(#[from] CollectorError),

    /// Required credential or setting missing at the point of use
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Not enough observations to compute an indicator
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Notification delivery failed after all retries
    #[error("Notification error: {0}")]
    Notification(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Storage and configuration errors abort the calling operation;
    /// everything else may be recorded as a partial failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Storage(_) | Self::Configuration(_) | Self::Io(_) => true,
            Self::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_) => true,
            Self::WithContext { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

/// Errors raised by market data collectors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectorError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with an error code or an unexpected payload
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Data not available for the requested symbol/date
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Invalid or unsupported request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal collector error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CollectorError {
    /// Check if the error is recoverable (worth retrying on the next poll)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Upstream(_))
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
