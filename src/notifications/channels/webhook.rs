//! Webhook notification channel
//!
//! This module provides a webhook channel for sending alerts via HTTP POST requests.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};
use crate::config::WebhookConfig;
use crate::notifications::Alert;
use crate::utils::retry::with_retry_if;

/// Webhook notification channel
///
/// Sends alerts as JSON payloads via HTTP POST requests.
///
/// # Payload Format
///
/// ```json
/// {
///   "id": "alert-uuid",
///   "severity": "warning",
///   "status": "created",
///   "message": "🚀 *Emerging Trends Alert* ...",
///   "condition": {
///     "type": "emerging_topics",
///     "topic_ids": ["twitter:#rust"]
///   },
///   "metadata": {},
///   "created_at": "2024-01-01T12:00:00Z"
/// }
/// ```
pub struct WebhookChannel {
    url: String,
    config: WebhookConfig,
    client: Client,
}

impl WebhookChannel {
    /// Create a new webhook channel
    pub fn new(config: &WebhookConfig) -> ChannelResult<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ChannelError::InvalidConfig("Webhook URL cannot be empty".into()))?;

        // Basic URL validation
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ChannelError::InvalidConfig(
                "Webhook URL must start with http:// or https://".into(),
            ));
        }

        if config.timeout_secs == 0 {
            return Err(ChannelError::InvalidConfig(
                "Timeout must be greater than 0".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url,
            config: config.clone(),
            client,
        })
    }

    /// Create a simple webhook channel with just a URL
    pub fn from_url(url: impl Into<String>) -> ChannelResult<Self> {
        Self::new(&WebhookConfig {
            url: Some(url.into()),
            ..Default::default()
        })
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the webhook payload from an alert
    fn build_payload(&self, alert: &Alert) -> serde_json::Value {
        serde_json::json!({
            "id": alert.id,
            "severity": alert.severity.as_str(),
            "status": alert.status.as_str(),
            "message": alert.message,
            "condition": alert.condition,
            "metadata": alert.metadata,
            "created_at": alert.created_at.to_rfc3339(),
        })
    }

    async fn post_once(&self, payload: &serde_json::Value) -> ChannelResult<()> {
        let mut request = self.client.post(&self.url);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request.json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if status.as_u16() == 429 {
            Err(ChannelError::RateLimited(format!("HTTP {status}: {body}")))
        } else if status.is_server_error() {
            Err(ChannelError::Unavailable(format!("HTTP {status}: {body}")))
        } else {
            // Don't retry on client errors (4xx)
            Err(ChannelError::Rejected(format!("HTTP {status}: {body}")))
        }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> ChannelResult<DeliveryStatus> {
        let payload = self.build_payload(alert);

        let result = with_retry_if(
            &self.config.retry,
            || self.post_once(&payload),
            ChannelError::is_retryable,
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!(url = %self.url, alert_id = %alert.id, "Webhook delivered");
                Ok(DeliveryStatus::success_with_message(
                    "webhook",
                    format!("Delivered to {}", self.url),
                ))
            }
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Failed to deliver webhook");
                Ok(DeliveryStatus::failure("webhook", e.to_string()))
            }
        }
    }

    async fn health_check(&self) -> ChannelResult<bool> {
        match self.client.head(&self.url).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Webhook health check failed");
                Ok(false)
            }
        }
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "url": self.url,
            "timeout_secs": self.config.timeout_secs,
            "max_retries": self.config.retry.max_retries,
            "has_auth": self.config.auth_token.is_some(),
            "custom_headers": self.config.headers.keys().collect::<Vec<_>>(),
        })
    }
}
