//! Error types for the monitor and its triggers

use std::fmt;

use crate::analytics::TrendError;

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Monitor-specific errors
#[derive(Debug)]
pub enum MonitorError {
    /// Invalid hour value (must be 0-23)
    InvalidHour { hour: u32 },

    /// Polling interval of zero or otherwise unusable
    InvalidInterval { field: String, minutes: u64 },

    /// Trigger configuration error
    TriggerConfigError { field: String, reason: String },

    /// A source poll failed
    SourceFailed { source: String, reason: String },

    /// Tracker rejected an observation or configuration
    Tracker(TrendError),

    /// Persisting or loading observations failed
    Storage { operation: String, reason: String },

    /// The monitor has been asked to stop
    ShuttingDown,
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHour { hour } => {
                write!(f, "Invalid hour '{}'. Must be 0-23", hour)
            }
            Self::InvalidInterval { field, minutes } => {
                write!(f, "Invalid interval for '{}': {} minutes", field, minutes)
            }
            Self::TriggerConfigError { field, reason } => {
                write!(f, "Trigger config error in '{}': {}", field, reason)
            }
            Self::SourceFailed { source, reason } => {
                write!(f, "Source '{}' failed: {}", source, reason)
            }
            Self::Tracker(e) => write!(f, "Tracker error: {}", e),
            Self::Storage { operation, reason } => {
                write!(f, "Storage error during '{}': {}", operation, reason)
            }
            Self::ShuttingDown => write!(f, "Monitor is shutting down"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tracker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TrendError> for MonitorError {
    fn from(err: TrendError) -> Self {
        Self::Tracker(err)
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage {
            operation: "unknown".to_string(),
            reason: format!("{err:#}"),
        }
    }
}

impl MonitorError {
    /// Create an invalid hour error
    pub fn invalid_hour(hour: u32) -> Self {
        Self::InvalidHour { hour }
    }

    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a source failure error
    pub fn source_failed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceFailed {
            source: source.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error with context
    pub fn storage(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SourceFailed { .. } | Self::Storage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_hour_error() {
        let err = MonitorError::invalid_hour(25);
        assert!(err.to_string().contains("25"));
        assert!(err.to_string().contains("0-23"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(MonitorError::source_failed("twitter", "timeout").is_recoverable());
        assert!(MonitorError::storage("save", "disk full").is_recoverable());
        assert!(!MonitorError::invalid_hour(25).is_recoverable());
        assert!(!MonitorError::ShuttingDown.is_recoverable());
    }

    #[test]
    fn test_from_trend_error() {
        let err: MonitorError = TrendError::invalid_config("weights", "must sum to 1").into();
        assert!(matches!(err, MonitorError::Tracker(_)));
        assert!(err.to_string().contains("weights"));
    }
}
