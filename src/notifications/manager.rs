//! Notification manager for alert orchestration

use super::channels::Channel;
use super::{format, Alert, AlertCondition, AlertSeverity, AlertStatus};
use crate::analytics::{ClassificationEvent, DailySummary};
use crate::metrics;
use crate::models::TopicId;
use crate::storage::ActivityReport;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Notification manager that coordinates alerts and channels
///
/// Methods take `&self` so the manager can be shared between polling loops;
/// only the dedup bookkeeping is behind a lock.
pub struct NotificationManager {
    /// Registered notification channels
    channels: Vec<Box<dyn Channel>>,

    /// Deduplication: last trigger time per condition key
    last_triggered: Mutex<HashMap<String, DateTime<Utc>>>,

    /// Minimum time between duplicate alerts (minutes)
    dedup_window_minutes: i64,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    /// Create a new notification manager
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            last_triggered: Mutex::new(HashMap::new()),
            dedup_window_minutes: 60,
        }
    }

    /// Set deduplication window in minutes
    pub fn with_dedup_window(mut self, minutes: i64) -> Self {
        self.dedup_window_minutes = minutes;
        self
    }

    /// Add a notification channel
    pub fn add_channel(&mut self, channel: Box<dyn Channel>) {
        tracing::info!(channel = channel.name(), "Notification channel registered");
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> impl Iterator<Item = &dyn Channel> {
        self.channels.iter().map(|c| c.as_ref())
    }

    fn dedup_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.last_triggered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn is_recent(&self, map: &HashMap<String, DateTime<Utc>>, key: &str, now: DateTime<Utc>) -> bool {
        map.get(key)
            .is_some_and(|&last| now - last < Duration::minutes(self.dedup_window_minutes))
    }

    /// Whether an alert with this dedup key would currently be suppressed
    pub fn is_suppressed(&self, key: &str, now: DateTime<Utc>) -> bool {
        let map = self.dedup_map();
        self.is_recent(&map, key, now)
    }

    /// Create an alert unless every dedup key was delivered within the window
    ///
    /// Keys are only recorded once [`dispatch_at`](Self::dispatch_at)
    /// reaches a channel, so an undelivered alert can be retried next cycle.
    pub fn create_alert_at(
        &self,
        condition: AlertCondition,
        severity: AlertSeverity,
        message: String,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let keys = condition.dedup_keys();
        let map = self.dedup_map();

        if !keys.is_empty() && keys.iter().all(|k| self.is_recent(&map, k, now)) {
            tracing::debug!(condition = %condition.description(), "Alert suppressed as duplicate");
            return None;
        }

        Some(Alert::new(condition, severity, message))
    }

    /// Create an alert at the current time
    pub fn create_alert(
        &self,
        condition: AlertCondition,
        severity: AlertSeverity,
        message: String,
    ) -> Option<Alert> {
        self.create_alert_at(condition, severity, message, Utc::now())
    }

    /// Send an alert to every channel
    pub async fn dispatch(&self, alert: Alert) -> Alert {
        self.dispatch_at(alert, Utc::now()).await
    }

    /// Send an alert to every channel, as of `now`
    ///
    /// The alert is `Triggered` when at least one channel delivered it, and
    /// only then are its dedup keys recorded at `now`.
    pub async fn dispatch_at(&self, mut alert: Alert, now: DateTime<Utc>) -> Alert {
        let mut delivered = 0usize;

        for channel in &self.channels {
            let outcome = match channel.send(&alert).await {
                Ok(status) if status.success => {
                    delivered += 1;
                    "success"
                }
                Ok(status) => {
                    tracing::warn!(channel = channel.name(), %status, "Alert delivery failed");
                    "failure"
                }
                Err(e) => {
                    tracing::error!(channel = channel.name(), error = %e, "Failed to send alert to channel");
                    "failure"
                }
            };
            metrics::record_alert(channel.name(), alert.condition.condition_type(), outcome);
        }

        if delivered > 0 || self.channels.is_empty() {
            alert.trigger();
            let mut map = self.dedup_map();
            for key in alert.condition.dedup_keys() {
                map.insert(key, now);
            }
        } else {
            alert.fail();
        }

        tracing::info!(
            alert_id = %alert.id,
            condition = alert.condition.condition_type(),
            status = %alert.status,
            delivered = delivered,
            channels = self.channels.len(),
            "Alert dispatched"
        );
        alert
    }

    /// Create and immediately dispatch an alert
    pub async fn alert(
        &self,
        condition: AlertCondition,
        severity: AlertSeverity,
        message: String,
    ) -> Option<Alert> {
        let alert = self.create_alert(condition, severity, message)?;
        Some(self.dispatch(alert).await)
    }

    /// Alert on topics that just became EMERGING
    ///
    /// Non-emergence events and topics alerted within the dedup window are
    /// skipped; the rest are ranked by score and the best `top_n` are sent
    /// in one message.
    pub async fn notify_emerging(
        &self,
        events: &[ClassificationEvent],
        labels: &HashMap<TopicId, String>,
        top_n: usize,
    ) -> Option<Alert> {
        let now = Utc::now();
        let mut fresh: Vec<ClassificationEvent> = events
            .iter()
            .filter(|e| e.is_emergence())
            .filter(|e| {
                !self.is_suppressed(&AlertCondition::emerging_key(e.topic_id.as_str()), now)
            })
            .cloned()
            .collect();

        if fresh.is_empty() {
            return None;
        }

        fresh.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.topic_id.cmp(&b.topic_id))
        });
        fresh.truncate(top_n.max(1));

        let condition = AlertCondition::EmergingTopics {
            topic_ids: fresh.iter().map(|e| e.topic_id.to_string()).collect(),
        };
        let message = format::emerging_alert(&fresh, labels, now);
        let alert = self
            .create_alert_at(condition, AlertSeverity::Warning, message, now)?
            .with_metadata("topics", fresh.len().to_string());

        Some(self.dispatch_at(alert, now).await)
    }

    /// Send the daily summary, at most once per local date
    pub async fn notify_daily_summary(
        &self,
        summary: &DailySummary,
        activity: Option<&ActivityReport>,
        labels: &HashMap<TopicId, String>,
        date: NaiveDate,
    ) -> Option<Alert> {
        let message = format::daily_summary(summary, activity, labels);
        let alert = self
            .create_alert(AlertCondition::DailySummary { date }, AlertSeverity::Info, message)?
            .with_metadata("tracked_topics", summary.tracked_topics.to_string());

        Some(self.dispatch(alert).await)
    }

    /// Warn that a source keeps failing
    pub async fn notify_source_failure(
        &self,
        source: &str,
        consecutive_failures: u32,
        error: &str,
    ) -> Option<Alert> {
        let condition = AlertCondition::SourceFailure {
            source: source.to_string(),
            consecutive_failures,
        };
        let message = format::source_failure(source, consecutive_failures, error);
        self.alert(condition, AlertSeverity::Critical, message).await
    }

    /// Send a connectivity test through every channel
    pub async fn send_test(&self) -> Alert {
        let alert = Alert::new(
            AlertCondition::Test,
            AlertSeverity::Info,
            format::test_message(),
        );
        self.dispatch(alert).await
    }

    /// Run every channel's health check
    pub async fn health_check(&self) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let healthy = channel.health_check().await.unwrap_or(false);
            results.push((channel.name().to_string(), healthy));
        }
        results
    }

    /// Drop dedup entries older than the window
    pub fn cleanup_expired(&self, now: DateTime<Utc>) {
        let window = Duration::minutes(self.dedup_window_minutes);
        self.dedup_map().retain(|_, last| now - *last < window);
    }
}

/// Alerts that reached no channel are worth surfacing to the caller
pub fn was_delivered(alert: &Alert) -> bool {
    alert.status == AlertStatus::Triggered
}
