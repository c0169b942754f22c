//! Reddit hot-posts source
//!
//! Authenticates with the client-credentials OAuth flow and reads the hot
//! listing of each configured subreddit. Each post becomes one topic keyed by
//! its title.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{endpoint, ApiClient, SourceError, SourceResult, TrendSource};
use crate::config::RedditConfig;
use crate::models::{CollectedTopic, MetricSnapshot, Platform};
use crate::utils::clean_text;

/// Refresh the token this long before Reddit says it expires
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Post,
}

/// Fields of a hot post the source uses
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub subreddit: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvote_ratio: f64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub stickied: bool,
}

impl Post {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let created = self.created_utc.filter(|c| c.is_finite() && *c > 0.0)?;
        Utc.timestamp_opt(created as i64, 0).single()
    }

    pub fn full_permalink(&self) -> String {
        format!("https://reddit.com{}", self.permalink)
    }

    /// Normalize into a topic observed at `now`
    ///
    /// `None` when the creation time is missing or invalid: without an age
    /// the recency component cannot be computed.
    pub fn into_topic(self, now: DateTime<Utc>) -> Option<CollectedTopic> {
        let age_minutes = (now - self.created_at()?).num_seconds().max(0) as f64 / 60.0;

        let title = clean_text(&self.title);
        let snapshot = MetricSnapshot::new(Platform::Reddit, &title, now)
            .with_volume(self.num_comments)
            .with_engagement(self.score, self.num_comments)
            .with_age_minutes(age_minutes);

        let metadata = serde_json::json!({
            "subreddit": self.subreddit,
            "upvote_ratio": self.upvote_ratio,
            "url": self.url,
            "permalink": self.full_permalink(),
        });

        Some(
            CollectedTopic::new(snapshot, title)
                .with_source_id(self.id)
                .with_metadata(metadata),
        )
    }
}

/// Reddit hot-posts source
pub struct RedditSource {
    config: RedditConfig,
    client_id: String,
    client_secret: String,
    api: ApiClient,
    token: Mutex<Option<AccessToken>>,
}

impl RedditSource {
    pub fn new(config: &RedditConfig) -> SourceResult<Self> {
        let client_id = config
            .client_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or(SourceError::NotConfigured("reddit"))?;
        let client_secret = config
            .client_secret
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or(SourceError::NotConfigured("reddit"))?;

        let api = ApiClient::new(
            std::time::Duration::from_secs(config.request_timeout_secs.max(1)),
            config.requests_per_minute,
            &config.user_agent,
            config.retry.clone(),
        )?;

        Ok(Self {
            config: config.clone(),
            client_id,
            client_secret,
            api,
            token: Mutex::new(None),
        })
    }

    /// Return a cached access token or request a new one
    async fn access_token(&self) -> SourceResult<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref().filter(|t| t.is_valid_at(now)) {
            return Ok(token.value.clone());
        }

        let url = endpoint(&self.config.auth_base_url, "api/v1/access_token")?;
        let response: TokenResponse = self
            .api
            .send_json(|client| {
                client
                    .post(url.clone())
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body("grant_type=client_credentials")
            })
            .await?;

        if response.access_token.is_empty() {
            return Err(SourceError::Auth("empty access token".into()));
        }

        let lifetime = (response.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
        let token = AccessToken {
            value: response.access_token,
            expires_at: now + Duration::seconds(lifetime),
        };
        tracing::debug!(expires_at = %token.expires_at, "Obtained Reddit access token");

        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Hot posts of one subreddit, stickied posts excluded
    pub async fn hot_posts(&self, subreddit: &str, limit: u32) -> SourceResult<Vec<Post>> {
        let token = self.access_token().await?;

        let mut url = endpoint(&self.config.api_base_url, &format!("r/{subreddit}/hot"))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("raw_json", "1");

        let listing: Listing = match self
            .api
            .send_json(|client| client.get(url.clone()).bearer_auth(&token))
            .await
        {
            Err(SourceError::Auth(reason)) => {
                self.invalidate_token().await;
                return Err(SourceError::Auth(reason));
            }
            other => other?,
        };

        let posts: Vec<Post> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|post| !post.stickied)
            .collect();

        tracing::info!(subreddit = subreddit, count = posts.len(), "Fetched hot posts");
        Ok(posts)
    }
}

#[async_trait]
impl TrendSource for RedditSource {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    /// Fails only if every subreddit failed
    async fn fetch(&self) -> SourceResult<Vec<CollectedTopic>> {
        let now = Utc::now();
        let mut topics = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for subreddit in &self.config.subreddits {
            match self
                .hot_posts(subreddit, self.config.posts_per_subreddit)
                .await
            {
                Ok(posts) => {
                    succeeded += 1;
                    for post in posts.into_iter().filter(|p| !p.title.trim().is_empty()) {
                        let id = post.id.clone();
                        match post.into_topic(now) {
                            Some(topic) => topics.push(topic),
                            None => tracing::warn!(
                                subreddit = %subreddit,
                                post_id = %id,
                                "Skipping post without a valid creation time"
                            ),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(subreddit = %subreddit, error = %e, "Failed to fetch subreddit");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => {
                tracing::info!(count = topics.len(), "Fetched hot topics from Reddit");
                Ok(topics)
            }
        }
    }
}
