//! Common test utilities

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use trendbot::analytics::{Score, Scorer};
use trendbot::config::{RedditConfig, TelegramConfig, TwitterConfig};
use trendbot::models::{CollectedTopic, MetricSnapshot, Platform};
use trendbot::utils::retry::RetryConfig;

/// Fixed reference time so scenarios are reproducible
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Snapshot with the given volume and engagement, observed at `at`
pub fn snapshot(
    platform: Platform,
    name: &str,
    at: DateTime<Utc>,
    volume: i64,
    positive: i64,
    amplification: i64,
) -> MetricSnapshot {
    MetricSnapshot::new(platform, name, at)
        .with_volume(volume)
        .with_engagement(positive, amplification)
}

/// Collected Twitter topic whose display name is `name`
pub fn collected(name: &str, at: DateTime<Utc>, volume: i64, positive: i64) -> CollectedTopic {
    CollectedTopic::new(
        snapshot(Platform::Twitter, name, at, volume, positive, positive / 5),
        name,
    )
    .with_source_id(name)
}

/// Score a snapshot with the default scorer and no previous observation
pub fn scored(snapshot: MetricSnapshot) -> Score {
    Scorer::default().score(&snapshot, None).unwrap()
}

/// Retry policy that gives up immediately
pub fn no_retry() -> RetryConfig {
    RetryConfig::none()
}

pub fn twitter_config(base_url: &str) -> TwitterConfig {
    TwitterConfig {
        bearer_token: Some("test-token".into()),
        api_base_url: base_url.to_string(),
        requests_per_minute: 600,
        retry: no_retry(),
        ..Default::default()
    }
}

pub fn reddit_config(base_url: &str, subreddits: &[&str]) -> RedditConfig {
    RedditConfig {
        client_id: Some("client".into()),
        client_secret: Some("secret".into()),
        subreddits: subreddits.iter().map(|s| s.to_string()).collect(),
        auth_base_url: base_url.to_string(),
        api_base_url: base_url.to_string(),
        requests_per_minute: 600,
        retry: no_retry(),
        ..Default::default()
    }
}

pub fn telegram_config(base_url: &str) -> TelegramConfig {
    TelegramConfig {
        bot_token: Some("123:abc".into()),
        chat_id: Some("-100200".into()),
        api_base_url: base_url.to_string(),
        retry: no_retry(),
        ..Default::default()
    }
}

/// Reddit listing JSON with one post per `(id, title, score, comments)`
pub fn reddit_listing(posts: &[(&str, &str, i64, i64)], stickied_first: bool) -> serde_json::Value {
    let children: Vec<serde_json::Value> = posts
        .iter()
        .enumerate()
        .map(|(i, (id, title, score, comments))| {
            serde_json::json!({
                "kind": "t3",
                "data": {
                    "id": id,
                    "title": title,
                    "subreddit": "rust",
                    "score": score,
                    "upvote_ratio": 0.95,
                    "num_comments": comments,
                    "created_utc": 1_700_000_000.0,
                    "url": format!("https://example.com/{id}"),
                    "permalink": format!("/r/rust/comments/{id}/"),
                    "stickied": stickied_first && i == 0,
                }
            })
        })
        .collect();

    serde_json::json!({ "kind": "Listing", "data": { "children": children } })
}
