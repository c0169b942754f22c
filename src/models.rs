// Core data structures shared by sources, analytics and storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::normalize_whitespace;

/// Social platform a topic was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Reddit,
}

impl Platform {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Reddit => "reddit",
        }
    }

    /// Display label used in notifications
    pub fn label(&self) -> &'static str {
        match self {
            Self::Twitter => "Twitter",
            Self::Reddit => "Reddit",
        }
    }

    /// Create from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Some(Self::Twitter),
            "reddit" => Some(Self::Reddit),
            _ => None,
        }
    }

    /// Get all platforms
    pub fn all() -> Vec<Self> {
        vec![Self::Twitter, Self::Reddit]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform-qualified topic identifier: `<platform>:<normalized name>`
///
/// Names are trimmed, whitespace-collapsed and lowercased, so `#Rust ` and
/// `#rust` on Twitter map to the same topic. The same name on two platforms
/// always yields two distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Build an id from a platform and a raw topic name
    pub fn new(platform: Platform, name: &str) -> Self {
        let name = normalize_whitespace(name).to_lowercase();
        Self(format!("{}:{}", platform.as_str(), name))
    }

    /// Parse an already-qualified id such as `reddit:t3_abc`
    pub fn parse(raw: &str) -> Option<Self> {
        let (platform, name) = raw.split_once(':')?;
        let platform = Platform::parse(platform)?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(platform, name))
    }

    /// Platform prefix of this id, if it is well formed
    pub fn platform(&self) -> Option<Platform> {
        self.0.split_once(':').and_then(|(p, _)| Platform::parse(p))
    }

    /// Topic name without the platform prefix
    pub fn name(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, name)| name)
    }

    /// Whether the name part is empty
    pub fn is_blank(&self) -> bool {
        self.name().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TopicId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One observation of a topic's raw engagement metrics
///
/// Counts are signed so that malformed upstream values survive normalization
/// and are rejected by the scorer instead of silently wrapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Platform-qualified topic id
    pub topic_id: TopicId,

    /// Platform the snapshot came from
    pub platform: Platform,

    /// When the metrics were observed
    pub observed_at: DateTime<Utc>,

    /// Volume / mention count; `None` when the platform did not report one
    pub volume: Option<i64>,

    /// Likes or upvotes
    pub positive_engagement: i64,

    /// Retweets or comments
    pub amplification: i64,

    /// Minutes since the topic was first seen
    pub age_minutes: f64,
}

impl MetricSnapshot {
    /// Create a snapshot with zero engagement and unknown volume; use the
    /// `with_*` setters to fill it in
    pub fn new(platform: Platform, name: &str, observed_at: DateTime<Utc>) -> Self {
        Self {
            topic_id: TopicId::new(platform, name),
            platform,
            observed_at,
            volume: None,
            positive_engagement: 0,
            amplification: 0,
            age_minutes: 0.0,
        }
    }

    pub fn with_volume(mut self, volume: impl Into<Option<i64>>) -> Self {
        self.volume = volume.into();
        self
    }

    pub fn with_engagement(mut self, positive: i64, amplification: i64) -> Self {
        self.positive_engagement = positive;
        self.amplification = amplification;
        self
    }

    pub fn with_age_minutes(mut self, age_minutes: f64) -> Self {
        self.age_minutes = age_minutes;
        self
    }

    /// Total engagement used by the scorer
    pub fn total_engagement(&self) -> i64 {
        self.positive_engagement.saturating_add(self.amplification)
    }
}

/// A snapshot plus the presentation data the store and notifier need
///
/// Sources produce these; only `snapshot` reaches the scoring core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedTopic {
    /// Normalized metrics
    pub snapshot: MetricSnapshot,

    /// Human-readable name (hashtag or post title)
    pub display_name: String,

    /// Upstream identifier (trend query, Reddit post id)
    pub source_id: String,

    /// Platform-specific extras (subreddit, permalink, upvote ratio, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CollectedTopic {
    pub fn new(snapshot: MetricSnapshot, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            source_id: snapshot.topic_id.to_string(),
            snapshot,
            display_name,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
