//! Errors raised by the scoring and tracking core
//!
//! All of these are caller errors: retrying the same call can never succeed.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::TopicId;

/// Result type for scoring and tracking operations
pub type TrendResult<T> = Result<T, TrendError>;

/// Scoring and tracking errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrendError {
    /// A snapshot field violates the scorer's input contract
    #[error("Invalid metric '{field}': {reason}")]
    InvalidMetric { field: String, reason: String },

    /// An observation arrived with a timestamp older than the topic's latest
    #[error("Out-of-order observation for {topic_id}: last {last}, attempted {attempted}")]
    OutOfOrderObservation {
        topic_id: TopicId,
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    /// Weights or thresholds are unusable
    #[error("Invalid config '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl TrendError {
    pub fn invalid_metric(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMetric {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Core errors are never worth retrying
    pub fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    #[test]
    fn test_error_messages() {
        let err = TrendError::invalid_metric("volume", "must be >= 0, got -1");
        assert_eq!(err.to_string(), "Invalid metric 'volume': must be >= 0, got -1");

        let now = Utc::now();
        let err = TrendError::OutOfOrderObservation {
            topic_id: TopicId::new(Platform::Twitter, "#rust"),
            last: now,
            attempted: now - chrono::Duration::minutes(5),
        };
        assert!(err.to_string().contains("twitter:#rust"));
        assert!(!err.is_recoverable());
    }
}
