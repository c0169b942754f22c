//! Unified error handling for the trendbot crate
//!
//! Domain errors stay in their modules. [`Error`] wraps them for the two
//! edges that need a single type: the binary, which turns a failed command
//! into a log line and an exit code, and the HTTP surface, which turns it
//! into a status code.
//!
//! Storage and command code reports through `anyhow`; converting an
//! `anyhow::Error` keeps its full context chain as the message and recovers
//! the domain error underneath it for classification.
//!
//! ```rust,ignore
//! use trendbot::error::{Error, TrendbotErrorTrait};
//!
//! let err = Error::from(anyhow_err);
//! tracing::error!(category = err.category().as_str(), "{err}");
//! ```

use std::io;
use thiserror::Error;

pub use crate::analytics::TrendError;
pub use crate::notifications::ChannelError;
pub use crate::scheduler::error::MonitorError;
pub use crate::sources::SourceError;

/// Common trait for trendbot error types
pub trait TrendbotErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid metrics, out-of-order observations
    Scoring,
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Storage and I/O errors
    Storage,
    /// Alert delivery errors
    Notification,
    /// Configuration and validation errors
    Config,
    /// Monitor and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scoring => "scoring",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Notification => "notification",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }

    /// Process exit code, following the BSD `sysexits` values
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config => 78,                       // EX_CONFIG
            Self::Network | Self::Notification => 69, // EX_UNAVAILABLE
            Self::Storage => 74,                      // EX_IOERR
            Self::Scoring => 65,                      // EX_DATAERR
            Self::Scheduler => 75,                    // EX_TEMPFAIL
            Self::Other => 1,
        }
    }
}

/// Unified error type for the trendbot crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scoring and tracking errors
    #[error("Trend error: {0}")]
    Trend(#[from] TrendError),

    /// Platform polling errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Notification channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Monitor errors
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// An error reported with context; `source` is the domain error found
    /// underneath it, if any
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<Error>>,
    },
}

impl TrendbotErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Trend(e) => e.is_recoverable(),
            Self::Source(e) => e.is_retryable(),
            Self::Channel(e) => e.is_retryable(),
            Self::Monitor(e) => e.is_recoverable(),
            Self::Database(_) => false,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Http(_) => true, // HTTP errors are often transient
            Self::Config(_) => false,
            Self::Other { source, .. } => source.as_ref().is_some_and(|e| e.is_recoverable()),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Trend(TrendError::InvalidConfig { .. }) => ErrorCategory::Config,
            Self::Trend(_) => ErrorCategory::Scoring,
            Self::Source(SourceError::NotConfigured(_)) => ErrorCategory::Config,
            Self::Source(_) | Self::Http(_) => ErrorCategory::Network,
            Self::Channel(ChannelError::InvalidConfig(_)) => ErrorCategory::Config,
            Self::Channel(_) => ErrorCategory::Notification,
            Self::Monitor(MonitorError::Storage { .. }) => ErrorCategory::Storage,
            Self::Monitor(MonitorError::Tracker(_)) => ErrorCategory::Scoring,
            Self::Monitor(MonitorError::SourceFailed { .. }) => ErrorCategory::Network,
            Self::Monitor(_) => ErrorCategory::Scheduler,
            Self::Database(_) | Self::Io(_) | Self::Json(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { source, .. } => source
                .as_ref()
                .map_or(ErrorCategory::Other, |e| e.category()),
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

fn downcast<E>(err: anyhow::Error) -> std::result::Result<Error, anyhow::Error>
where
    E: Into<Error> + std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
{
    err.downcast::<E>().map(Into::into)
}

/// First domain error found in the chain of `err`
fn domain_error(err: anyhow::Error) -> Option<Error> {
    downcast::<TrendError>(err)
        .or_else(downcast::<SourceError>)
        .or_else(downcast::<ChannelError>)
        .or_else(downcast::<MonitorError>)
        .or_else(downcast::<rusqlite::Error>)
        .or_else(downcast::<io::Error>)
        .or_else(downcast::<serde_json::Error>)
        .or_else(downcast::<reqwest::Error>)
        .ok()
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: domain_error(err).map(Box::new),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
