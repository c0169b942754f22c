//! Twitter trends source
//!
//! Trends for a WOEID come from the v1.1 `trends/place` endpoint. The top
//! trends are enriched with a v2 recent-search sample whose public metrics
//! are summed into engagement. A trend without a reported tweet volume keeps
//! an unknown volume rather than a zero one.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{endpoint, ApiClient, SourceError, SourceResult, TrendSource};
use crate::config::TwitterConfig;
use crate::models::{CollectedTopic, MetricSnapshot, Platform, TopicId};
use crate::utils::clean_text;

/// Topics not reported for this long lose their first-seen timestamp
const FIRST_SEEN_RETENTION_HOURS: i64 = 48;

#[derive(Debug, Deserialize)]
struct TrendsPlace {
    #[serde(default)]
    trends: Vec<Trend>,
}

/// One entry of a `trends/place` response
#[derive(Debug, Clone, Deserialize)]
pub struct Trend {
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub tweet_volume: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: i64,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub quote_count: i64,
}

impl PublicMetrics {
    /// Likes map to positive engagement
    pub fn positive(&self) -> i64 {
        self.like_count
    }

    /// Retweets, replies and quotes map to amplification
    pub fn amplification(&self) -> i64 {
        self.retweet_count
            .saturating_add(self.reply_count)
            .saturating_add(self.quote_count)
    }

    fn accumulate(mut self, other: &PublicMetrics) -> Self {
        self.retweet_count = self.retweet_count.saturating_add(other.retweet_count);
        self.reply_count = self.reply_count.saturating_add(other.reply_count);
        self.like_count = self.like_count.saturating_add(other.like_count);
        self.quote_count = self.quote_count.saturating_add(other.quote_count);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Sighting {
    first: DateTime<Utc>,
    last: DateTime<Utc>,
}

/// Twitter trends source
pub struct TwitterSource {
    config: TwitterConfig,
    token: String,
    api: ApiClient,
    sightings: Mutex<HashMap<TopicId, Sighting>>,
}

impl TwitterSource {
    pub fn new(config: &TwitterConfig) -> SourceResult<Self> {
        let token = config
            .bearer_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(SourceError::NotConfigured("twitter"))?;

        let api = ApiClient::new(
            std::time::Duration::from_secs(config.request_timeout_secs.max(1)),
            config.requests_per_minute,
            "TrendBot/1.0",
            config.retry.clone(),
        )?;

        Ok(Self {
            config: config.clone(),
            token,
            api,
            sightings: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch the trend list for the configured WOEID
    pub async fn trending_topics(&self) -> SourceResult<Vec<Trend>> {
        let mut url = endpoint(&self.config.api_base_url, "1.1/trends/place.json")?;
        url.query_pairs_mut()
            .append_pair("id", &self.config.woeid.to_string());

        let places: Vec<TrendsPlace> = self
            .api
            .send_json(|client| client.get(url.clone()).bearer_auth(&self.token))
            .await?;

        let mut trends = places
            .into_iter()
            .next()
            .map(|place| place.trends)
            .ok_or_else(|| SourceError::InvalidResponse("empty trends response".into()))?;

        trends.truncate(self.config.max_trends);
        tracing::info!(woeid = self.config.woeid, count = trends.len(), "Fetched Twitter trends");
        Ok(trends)
    }

    /// Sum public metrics over a recent-tweet sample for `query`
    pub async fn search_metrics(&self, query: &str) -> SourceResult<(PublicMetrics, usize)> {
        let mut url = endpoint(&self.config.api_base_url, "2/tweets/search/recent")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair(
                "max_results",
                &self.config.search_max_results.clamp(10, 100).to_string(),
            )
            .append_pair("tweet.fields", "created_at,public_metrics");

        let response: SearchResponse = self
            .api
            .send_json(|client| client.get(url.clone()).bearer_auth(&self.token))
            .await?;

        let totals = response
            .data
            .iter()
            .filter_map(|t| t.public_metrics.as_ref())
            .fold(PublicMetrics::default(), PublicMetrics::accumulate);

        tracing::debug!(query = query, tweets = response.data.len(), "Searched recent tweets");
        Ok((totals, response.data.len()))
    }

    /// Minutes since `topic_id` was first reported, updating the sighting table
    fn age_minutes(&self, topic_id: &TopicId, now: DateTime<Utc>) -> f64 {
        let mut sightings = self.sightings.lock().unwrap_or_else(|e| e.into_inner());
        let sighting = sightings
            .entry(topic_id.clone())
            .and_modify(|s| s.last = now)
            .or_insert(Sighting {
                first: now,
                last: now,
            });
        let age = (now - sighting.first).num_seconds().max(0) as f64 / 60.0;

        let cutoff = now - Duration::hours(FIRST_SEEN_RETENTION_HOURS);
        sightings.retain(|_, s| s.last >= cutoff);
        age
    }

    async fn collect(&self, trend: &Trend, now: DateTime<Utc>) -> SourceResult<CollectedTopic> {
        let query = trend.query.clone().unwrap_or_else(|| trend.name.clone());
        let volume = trend.tweet_volume.filter(|v| *v >= 0);
        let (metrics, sampled) = self.search_metrics(&query).await?;

        let topic_id = TopicId::new(Platform::Twitter, &trend.name);
        let snapshot = MetricSnapshot::new(Platform::Twitter, &trend.name, now)
            .with_volume(volume)
            .with_engagement(metrics.positive(), metrics.amplification())
            .with_age_minutes(self.age_minutes(&topic_id, now));

        Ok(CollectedTopic::new(snapshot, clean_text(&trend.name))
            .with_source_id(query.clone())
            .with_metadata(serde_json::json!({
                "query": query,
                "url": trend.url,
                "woeid": self.config.woeid,
                "tweet_volume": trend.tweet_volume,
                "sampled_tweets": sampled,
            })))
    }
}

#[async_trait]
impl TrendSource for TwitterSource {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch(&self) -> SourceResult<Vec<CollectedTopic>> {
        let now = Utc::now();
        let trends = self.trending_topics().await?;
        let mut topics = Vec::with_capacity(trends.len());

        for trend in &trends {
            if TopicId::new(Platform::Twitter, &trend.name).is_blank() {
                continue;
            }
            match self.collect(trend, now).await {
                Ok(topic) => topics.push(topic),
                Err(SourceError::Auth(reason)) => return Err(SourceError::Auth(reason)),
                Err(e) => {
                    // Without engagement the score would be meaningless; skip this cycle.
                    tracing::warn!(trend = %trend.name, error = %e, "Failed to enrich trend");
                }
            }
        }

        Ok(topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TwitterConfig {
        TwitterConfig {
            bearer_token: Some("token".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_bearer_token() {
        let missing = TwitterConfig::default();
        assert!(matches!(
            TwitterSource::new(&missing),
            Err(SourceError::NotConfigured("twitter"))
        ));
        assert!(TwitterSource::new(&config()).is_ok());
    }

    #[test]
    fn test_public_metrics_mapping() {
        let metrics = PublicMetrics {
            retweet_count: 10,
            reply_count: 5,
            like_count: 100,
            quote_count: 2,
        };
        assert_eq!(metrics.positive(), 100);
        assert_eq!(metrics.amplification(), 17);

        let doubled = metrics.accumulate(&metrics);
        assert_eq!(doubled.like_count, 200);
    }

    #[test]
    fn test_age_tracks_first_sighting() {
        let source = TwitterSource::new(&config()).unwrap();
        let id = TopicId::new(Platform::Twitter, "#rust");
        let t0 = Utc::now();

        assert_eq!(source.age_minutes(&id, t0), 0.0);
        assert_eq!(source.age_minutes(&id, t0 + Duration::minutes(30)), 30.0);

        // Unseen for longer than the retention window: starts over.
        let later = t0 + Duration::hours(FIRST_SEEN_RETENTION_HOURS + 1);
        let other = TopicId::new(Platform::Twitter, "#other");
        source.age_minutes(&other, later);
        assert_eq!(source.age_minutes(&id, later), 0.0);
    }

    #[test]
    fn test_trend_deserialization() {
        let json = r##"[{"trends":[{"name":"#Rust","query":"%23Rust","tweet_volume":12000,"url":"http://x"},{"name":"Quiet","tweet_volume":null}]}]"##;
        let places: Vec<TrendsPlace> = serde_json::from_str(json).unwrap();
        assert_eq!(places[0].trends.len(), 2);
        assert_eq!(places[0].trends[0].tweet_volume, Some(12000));
        assert_eq!(places[0].trends[1].query, None);
    }
}
