//! Alert conditions for the notification system
//!
//! Each condition knows its deduplication keys: an alert is suppressed when
//! every one of its keys was already alerted within the dedup window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Alert condition types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertCondition {
    /// One or more topics transitioned into EMERGING
    EmergingTopics {
        /// Platform-qualified topic ids, best score first
        topic_ids: Vec<String>,
    },

    /// Scheduled digest of the trailing day
    DailySummary {
        /// Local date the summary covers
        date: NaiveDate,
    },

    /// A platform source keeps failing
    SourceFailure {
        /// Source name (`twitter`, `reddit`)
        source: String,
        /// Number of consecutive failures
        consecutive_failures: u32,
    },

    /// Manual connectivity test
    Test,
}

impl AlertCondition {
    /// Get a human-readable description of the condition
    pub fn description(&self) -> String {
        match self {
            Self::EmergingTopics { topic_ids } => {
                format!("Emerging topics: {}", topic_ids.join(", "))
            }
            Self::DailySummary { date } => format!("Daily summary for {date}"),
            Self::SourceFailure {
                source,
                consecutive_failures,
            } => {
                format!("Source '{source}' failed {consecutive_failures} consecutive times")
            }
            Self::Test => "Notification test".to_string(),
        }
    }

    /// Get the condition type as a string
    pub fn condition_type(&self) -> &'static str {
        match self {
            Self::EmergingTopics { .. } => "emerging_topics",
            Self::DailySummary { .. } => "daily_summary",
            Self::SourceFailure { .. } => "source_failure",
            Self::Test => "test",
        }
    }

    /// Keys used for deduplication
    ///
    /// Emerging alerts dedup per topic; source failures per source regardless
    /// of the failure count. Test alerts are never deduplicated.
    pub fn dedup_keys(&self) -> Vec<String> {
        match self {
            Self::EmergingTopics { topic_ids } => topic_ids
                .iter()
                .map(|id| Self::emerging_key(id))
                .collect(),
            Self::DailySummary { date } => vec![format!("daily_summary:{date}")],
            Self::SourceFailure { source, .. } => vec![format!("source_failure:{source}")],
            Self::Test => Vec::new(),
        }
    }

    /// Dedup key of a single emerging topic
    pub fn emerging_key(topic_id: &str) -> String {
        format!("emerging_topic:{topic_id}")
    }
}
