//! Notification system for trend alerts
//!
//! Classification events and daily summaries from the tracker are turned into
//! alerts and fanned out to every registered channel.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      NotificationManager                   │
//! │  - Alert generation                        │
//! │  - Per-condition deduplication             │
//! │  - Channel fan-out                         │
//! └────────────────────────────────────────────┘
//!                     │
//!             ┌───────┴───────┐
//!             ▼               ▼
//!       ┌──────────┐    ┌─────────┐
//!       │ Telegram │    │ Webhook │
//!       │ Channel  │    │ Channel │
//!       └──────────┘    └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use trendbot::notifications::{NotificationManager, TelegramChannel};
//!
//! let mut manager = NotificationManager::new().with_dedup_window(60);
//! manager.add_channel(Box::new(TelegramChannel::new(&config.telegram)?));
//!
//! let alert = manager.notify_emerging(&events, &labels, 3).await;
//! ```

pub mod channels;
pub mod conditions;
pub mod format;
mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// Re-exports
pub use channels::telegram::TelegramChannel;
pub use channels::webhook::WebhookChannel;
pub use channels::{Channel, ChannelError, ChannelResult, DeliveryStatus};
pub use conditions::AlertCondition;
pub use manager::{was_delivered, NotificationManager};

/// Severity level of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational alerts (summaries, connectivity tests)
    Info,
    /// Warning alerts that require attention
    Warning,
    /// Critical alerts requiring immediate action
    Critical,
}

impl AlertSeverity {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Get emoji representation
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Warning => "⚠️",
            Self::Critical => "🚨",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert status in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Alert created but not yet dispatched
    Created,
    /// Delivered by at least one channel
    Triggered,
    /// Every channel failed to deliver
    Failed,
}

impl AlertStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Triggered => "triggered",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An alert instance with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier
    pub id: String,
    /// Condition that produced this alert
    pub condition: AlertCondition,
    /// Severity level
    pub severity: AlertSeverity,
    /// Current status
    pub status: AlertStatus,
    /// Message body (Telegram Markdown)
    pub message: String,
    /// Additional context and metadata
    pub metadata: HashMap<String, String>,
    /// When the alert was created
    pub created_at: DateTime<Utc>,
    /// When the alert was dispatched
    pub triggered_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Create a new alert
    pub fn new(condition: AlertCondition, severity: AlertSeverity, message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            condition,
            severity,
            status: AlertStatus::Created,
            message,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            triggered_at: None,
        }
    }

    /// Add metadata to the alert
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark alert as dispatched
    pub fn trigger(&mut self) {
        self.status = AlertStatus::Triggered;
        self.triggered_at = Some(Utc::now());
    }

    /// Mark alert as undeliverable
    pub fn fail(&mut self) {
        self.status = AlertStatus::Failed;
        self.triggered_at = Some(Utc::now());
    }

    /// Format alert as plain text for logs
    pub fn format_message(&self) -> String {
        format!(
            "[{severity}] {condition}\nStatus: {status}\nCreated: {created}",
            severity = self.severity.as_str().to_uppercase(),
            condition = self.condition.description(),
            status = self.status.as_str(),
            created = self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_severity_display() {
        assert_eq!(AlertSeverity::Info.as_str(), "info");
        assert_eq!(AlertSeverity::Warning.as_str(), "warning");
        assert_eq!(AlertSeverity::Critical.to_string(), "critical");
    }

    #[test]
    fn test_alert_lifecycle() {
        let condition = AlertCondition::SourceFailure {
            source: "reddit".to_string(),
            consecutive_failures: 5,
        };

        let mut alert = Alert::new(condition, AlertSeverity::Warning, "Reddit down".to_string());
        assert_eq!(alert.status, AlertStatus::Created);
        assert!(alert.triggered_at.is_none());

        alert.trigger();
        assert_eq!(alert.status, AlertStatus::Triggered);
        assert!(alert.triggered_at.is_some());

        alert.fail();
        assert_eq!(alert.status, AlertStatus::Failed);
    }

    #[test]
    fn test_alert_with_metadata() {
        let alert = Alert::new(AlertCondition::Test, AlertSeverity::Info, "hi".to_string())
            .with_metadata("source", "cli");
        assert_eq!(alert.metadata.get("source"), Some(&"cli".to_string()));
    }

    #[test]
    fn test_alert_format_message() {
        let condition = AlertCondition::EmergingTopics {
            topic_ids: vec!["twitter:#rust".to_string()],
        };
        let alert = Alert::new(condition, AlertSeverity::Warning, "body".to_string());

        let formatted = alert.format_message();
        assert!(formatted.contains("WARNING"));
        assert!(formatted.contains("twitter:#rust"));
    }
}
