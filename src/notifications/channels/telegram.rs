//! Telegram notification channel
//!
//! Delivers alert messages through the Bot API `sendMessage` method with
//! legacy Markdown formatting. `getMe` doubles as the health check.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};
use crate::config::TelegramConfig;
use crate::notifications::Alert;
use crate::utils::retry::with_retry_if;

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Subset of the `getMe` result
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Telegram bot channel
pub struct TelegramChannel {
    token: String,
    chat_id: String,
    config: TelegramConfig,
    client: Client,
}

impl TelegramChannel {
    /// Create a channel from the `[telegram]` config section
    pub fn new(config: &TelegramConfig) -> ChannelResult<Self> {
        let token = config
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChannelError::InvalidConfig("Telegram bot token not provided".into()))?;
        let chat_id = config
            .chat_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ChannelError::InvalidConfig("Telegram chat id not provided".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            token,
            chat_id,
            config: config.clone(),
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    /// Send a Markdown message to the configured chat
    pub async fn send_message(&self, text: &str) -> ChannelResult<()> {
        with_retry_if(
            &self.config.retry,
            || self.send_message_once(text),
            ChannelError::is_retryable,
        )
        .await
    }

    async fn send_message_once(&self, text: &str) -> ChannelResult<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        parse_response::<serde_json::Value>(response).await.map(|_| ())
    }

    /// Call `getMe` and return the bot account
    pub async fn get_me(&self) -> ChannelResult<BotUser> {
        let response = self.client.get(self.method_url("getMe")).send().await?;

        parse_response::<BotUser>(response)
            .await?
            .ok_or_else(|| ChannelError::Rejected("getMe returned no result".into()))
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> ChannelResult<Option<T>> {
    let status = response.status();
    let text = response.text().await?;

    match serde_json::from_str::<ApiResponse<T>>(&text) {
        Ok(body) => check_response(status, body),
        Err(_) if status.is_server_error() => {
            Err(ChannelError::Unavailable(format!("HTTP {status}")))
        }
        Err(e) => Err(ChannelError::Rejected(format!(
            "HTTP {status}: unreadable response: {e}"
        ))),
    }
}

fn check_response<T>(status: reqwest::StatusCode, body: ApiResponse<T>) -> ChannelResult<Option<T>> {
    if body.ok {
        return Ok(body.result);
    }

    let description = body
        .description
        .unwrap_or_else(|| format!("HTTP {status}"));

    if status.as_u16() == 429 {
        let retry_after = body.parameters.and_then(|p| p.retry_after).unwrap_or(0);
        Err(ChannelError::RateLimited(format!(
            "{description} (retry after {retry_after}s)"
        )))
    } else if status.is_server_error() {
        Err(ChannelError::Unavailable(description))
    } else {
        Err(ChannelError::Rejected(description))
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, alert: &Alert) -> ChannelResult<DeliveryStatus> {
        match self.send_message(&alert.message).await {
            Ok(()) => {
                tracing::info!(chat_id = %self.chat_id, alert_id = %alert.id, "Message sent to Telegram chat");
                Ok(DeliveryStatus::success_with_message(
                    "telegram",
                    format!("Delivered to chat {}", self.chat_id),
                ))
            }
            Err(e) => {
                tracing::error!(chat_id = %self.chat_id, error = %e, "Failed to send Telegram message");
                Ok(DeliveryStatus::failure("telegram", e.to_string()))
            }
        }
    }

    async fn health_check(&self) -> ChannelResult<bool> {
        match self.get_me().await {
            Ok(bot) => {
                tracing::info!(
                    username = bot.username.as_deref().unwrap_or("unknown"),
                    "Telegram bot connected"
                );
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Telegram bot connection test failed");
                Ok(false)
            }
        }
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "chat_id": self.chat_id,
            "api_base_url": self.config.api_base_url,
            "max_retries": self.config.retry.max_retries,
        })
    }
}
