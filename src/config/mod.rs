//! Configuration management for trendbot
//!
//! This module handles loading and validating configuration from environment variables,
//! TOML files, and command-line arguments. Secrets (API tokens) are normally supplied
//! through the environment or a `.env` file and layered on top of the file settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::analytics::{ScoringConfig, TrackerConfig};
use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Twitter source configuration
    pub twitter: TwitterConfig,

    /// Reddit source configuration
    pub reddit: RedditConfig,

    /// Telegram notification channel
    pub telegram: TelegramConfig,

    /// Generic webhook notification channel
    pub webhook: WebhookConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Trend scoring weights and constants
    pub scoring: ScoringConfig,

    /// Trend tracker thresholds and windows
    pub tracker: TrackerConfig,

    /// Polling cadence and alerting
    pub schedule: ScheduleConfig,

    /// HTTP status server
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Twitter API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    /// App-only bearer token
    pub bearer_token: Option<String>,

    /// Where On Earth ID for trend lookups (1 = worldwide)
    pub woeid: i64,

    /// Maximum trends taken per poll
    pub max_trends: usize,

    /// Tweets sampled per trend for engagement (10-100)
    pub search_max_results: u32,

    /// API base URL (overridable for tests)
    pub api_base_url: String,

    /// Rate limit (requests per minute)
    pub requests_per_minute: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    pub retry: RetryConfig,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            woeid: 1,
            max_trends: 10,
            search_max_results: 10,
            api_base_url: String::from("https://api.twitter.com"),
            requests_per_minute: 30,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Reddit API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// User agent sent with every request (Reddit rejects generic agents)
    pub user_agent: String,

    /// Subreddits polled for hot posts
    pub subreddits: Vec<String>,

    /// Hot posts taken per subreddit
    pub posts_per_subreddit: u32,

    /// OAuth token endpoint host
    pub auth_base_url: String,

    /// Authenticated API host
    pub api_base_url: String,

    /// Rate limit (requests per minute)
    pub requests_per_minute: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    pub retry: RetryConfig,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: String::from("TrendBot/1.0"),
            subreddits: [
                "technology",
                "worldnews",
                "politics",
                "cryptocurrency",
                "programming",
                "artificial",
                "MachineLearning",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            posts_per_subreddit: 5,
            auth_base_url: String::from("https://www.reddit.com"),
            api_base_url: String::from("https://oauth.reddit.com"),
            requests_per_minute: 60,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,

    /// Bot API base URL (overridable for tests)
    pub api_base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub retry: RetryConfig,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base_url: String::from("https://api.telegram.org"),
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl TelegramConfig {
    /// Whether both token and chat id are present
    pub fn is_configured(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Generic webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Target URL; the channel is disabled when unset
    pub url: Option<String>,

    /// Optional bearer token
    pub auth_token: Option<String>,

    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub retry: RetryConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth_token: None,
            headers: HashMap::new(),
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/trends.db"),
        }
    }
}

/// Polling cadence and alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Twitter poll interval in minutes
    pub twitter_interval_minutes: u64,

    /// Reddit poll interval in minutes
    pub reddit_interval_minutes: u64,

    /// Interval for tracker refresh and garbage collection, in minutes
    pub maintenance_interval_minutes: u64,

    /// Local hour (0-23) at which the daily summary is sent
    pub daily_summary_hour: u32,

    /// Topics listed in an emerging-trend alert
    pub alert_top_n: usize,

    /// Identical alerts within this window are suppressed
    pub dedup_window_minutes: i64,

    /// Replay persisted observations into the tracker at startup
    pub warm_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            twitter_interval_minutes: 30,
            reddit_interval_minutes: 45,
            maintenance_interval_minutes: 15,
            daily_summary_hour: 20,
            alert_top_n: 3,
            dedup_window_minutes: 60,
            warm_start: true,
        }
    }
}

/// HTTP status server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve `/api/*` and `/metrics` while monitoring
    pub enabled: bool,

    /// Bind address
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: String::from("127.0.0.1:8080"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from an optional file, then layer environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables that are set
    pub fn apply_env(&mut self) {
        if let Some(v) = env_string("TWITTER_BEARER_TOKEN") {
            self.twitter.bearer_token = Some(v);
        }
        if let Some(v) = env_parse("TWITTER_WOEID") {
            self.twitter.woeid = v;
        }

        if let Some(v) = env_string("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(v);
        }
        if let Some(v) = env_string("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(v);
        }
        if let Some(v) = env_string("REDDIT_USER_AGENT") {
            self.reddit.user_agent = v;
        }
        if let Some(v) = env_string("REDDIT_SUBREDDITS") {
            self.reddit.subreddits = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = env_string("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = env_string("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(v);
        }

        if let Some(v) = env_string("WEBHOOK_URL") {
            self.webhook.url = Some(v);
        }
        if let Some(v) = env_string("WEBHOOK_AUTH_TOKEN") {
            self.webhook.auth_token = Some(v);
        }

        if let Some(v) = env_string("DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }

        if let Some(v) = env_parse("TRENDBOT_TWITTER_INTERVAL") {
            self.schedule.twitter_interval_minutes = v;
        }
        if let Some(v) = env_parse("TRENDBOT_REDDIT_INTERVAL") {
            self.schedule.reddit_interval_minutes = v;
        }
        if let Some(v) = env_parse("TRENDBOT_SUMMARY_HOUR") {
            self.schedule.daily_summary_hour = v;
        }

        if let Some(v) = env_parse("TRENDBOT_EMERGING_VELOCITY") {
            self.tracker.emerging_velocity = v;
        }
        if let Some(v) = env_parse("TRENDBOT_EMERGING_MIN_SCORE") {
            self.tracker.emerging_min_score = v;
        }

        if let Some(v) = env_string("TRENDBOT_SERVER_ADDR") {
            self.server.bind_addr = v;
            self.server.enabled = true;
        }

        if let Some(v) = env_string("TRENDBOT_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_string("TRENDBOT_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate().context("Invalid [scoring] section")?;
        self.tracker.validate().context("Invalid [tracker] section")?;

        if self.twitter.requests_per_minute == 0 || self.reddit.requests_per_minute == 0 {
            anyhow::bail!("requests_per_minute must be greater than 0");
        }

        if !(10..=100).contains(&self.twitter.search_max_results) {
            anyhow::bail!("twitter.search_max_results must be between 10 and 100");
        }

        if self.reddit.posts_per_subreddit == 0 || self.reddit.posts_per_subreddit > 100 {
            anyhow::bail!("reddit.posts_per_subreddit must be between 1 and 100");
        }

        if self.schedule.twitter_interval_minutes == 0
            || self.schedule.reddit_interval_minutes == 0
            || self.schedule.maintenance_interval_minutes == 0
        {
            anyhow::bail!("schedule intervals must be greater than 0");
        }

        if self.schedule.daily_summary_hour > 23 {
            anyhow::bail!(
                "daily_summary_hour must be 0-23, got {}",
                self.schedule.daily_summary_hour
            );
        }

        if self.schedule.dedup_window_minutes < 0 {
            anyhow::bail!("dedup_window_minutes must not be negative");
        }

        if let Some(url) = &self.webhook.url {
            url::Url::parse(url).with_context(|| format!("Invalid webhook URL: {url}"))?;
        }

        if self.server.enabled {
            self.server
                .bind_addr
                .parse::<std::net::SocketAddr>()
                .with_context(|| format!("Invalid server bind address: {}", self.server.bind_addr))?;
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Twitter request timeout as Duration
    #[must_use]
    pub fn twitter_timeout(&self) -> Duration {
        Duration::from_secs(self.twitter.request_timeout_secs)
    }

    /// Reddit request timeout as Duration
    #[must_use]
    pub fn reddit_timeout(&self) -> Duration {
        Duration::from_secs(self.reddit.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_subreddits() {
        let config = Config::default();
        assert_eq!(config.reddit.subreddits.len(), 7);
        assert!(config.reddit.subreddits.contains(&"MachineLearning".to_string()));
        assert_eq!(config.reddit.posts_per_subreddit, 5);
    }

    #[test]
    fn test_invalid_summary_hour() {
        let mut config = Config::default();
        config.schedule.daily_summary_hour = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut config = Config::default();
        config.scoring.velocity_weight = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tracker]
            emerging_min_score = 70.0

            [schedule]
            daily_summary_hour = 9
            "#,
        )
        .unwrap();

        assert_eq!(config.tracker.emerging_min_score, 70.0);
        assert_eq!(config.tracker.inactivity_hours, 6);
        assert_eq!(config.schedule.daily_summary_hour, 9);
        assert_eq!(config.schedule.twitter_interval_minutes, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.twitter_timeout(), Duration::from_secs(30));
        assert_eq!(config.reddit_timeout(), Duration::from_secs(30));
    }
}
