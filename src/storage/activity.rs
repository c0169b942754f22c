//! Per-platform activity over stored trend records
//!
//! The tracker only knows topics that emerged; this report covers every row
//! collected in a window, which is what the daily digest and the `summary`
//! command show as the platform breakdown.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::{TrendRecord, TrendStore};
use crate::models::Platform;

/// Rows read per platform when building a report
pub const ACTIVITY_ROW_LIMIT: usize = 5_000;

/// Records listed in [`ActivityReport::top_records`]
pub const TOP_RECORDS: usize = 10;

/// Activity of one platform in the window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformActivity {
    pub platform: Platform,
    pub records: usize,
    pub unique_topics: usize,
    pub avg_score: f64,
    pub max_score: f64,

    /// Display name of the highest-scoring record
    pub top_trend: Option<String>,

    /// Subreddit with the most records, Reddit only
    pub top_subreddit: Option<String>,
}

/// Stored activity since `since`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityReport {
    pub since: DateTime<Utc>,
    pub total_records: usize,
    pub unique_topics: usize,
    pub avg_score: f64,
    pub max_score: f64,

    /// Platforms with at least one record, in [`Platform::all`] order
    pub platforms: Vec<PlatformActivity>,

    /// Highest-scoring records overall, best first
    pub top_records: Vec<TrendRecord>,
}

impl ActivityReport {
    /// Aggregate `records`, which may span several platforms
    pub fn from_records(since: DateTime<Utc>, records: &[TrendRecord]) -> Self {
        let platforms = Platform::all()
            .into_iter()
            .filter_map(|platform| {
                let rows: Vec<&TrendRecord> =
                    records.iter().filter(|r| r.platform == platform).collect();
                platform_activity(platform, &rows)
            })
            .collect();

        let mut top_records: Vec<TrendRecord> = records.to_vec();
        top_records.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        top_records.truncate(TOP_RECORDS);

        let (avg_score, max_score) = score_stats(records.iter());
        Self {
            since,
            total_records: records.len(),
            unique_topics: unique_topics(records.iter()),
            avg_score,
            max_score,
            platforms,
            top_records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_records == 0
    }

    pub fn platform(&self, platform: Platform) -> Option<&PlatformActivity> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

fn platform_activity(platform: Platform, rows: &[&TrendRecord]) -> Option<PlatformActivity> {
    if rows.is_empty() {
        return None;
    }

    let top_trend = rows
        .iter()
        .max_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        })
        .map(|r| r.topic.clone());

    let top_subreddit = match platform {
        Platform::Reddit => most_active_subreddit(rows),
        Platform::Twitter => None,
    };

    let (avg_score, max_score) = score_stats(rows.iter().copied());
    Some(PlatformActivity {
        platform,
        records: rows.len(),
        unique_topics: unique_topics(rows.iter().copied()),
        avg_score,
        max_score,
        top_trend,
        top_subreddit,
    })
}

/// Most frequent `subreddit` metadata value; ties go to the first name
/// alphabetically
fn most_active_subreddit(rows: &[&TrendRecord]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in rows {
        if let Some(name) = row.metadata.get("subreddit").and_then(|v| v.as_str()) {
            *counts.entry(name).or_insert(0) += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.to_string())
}

fn unique_topics<'a>(rows: impl Iterator<Item = &'a TrendRecord>) -> usize {
    rows.map(TrendRecord::topic_id).collect::<HashSet<_>>().len()
}

fn score_stats<'a>(rows: impl Iterator<Item = &'a TrendRecord>) -> (f64, f64) {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut max = 0.0f64;
    for row in rows {
        count += 1;
        sum += row.score;
        max = max.max(row.score);
    }
    if count == 0 {
        (0.0, 0.0)
    } else {
        (sum / count as f64, max)
    }
}

impl TrendStore {
    /// Activity report over the trend records stored since `since`
    pub fn activity_report(&self, since: DateTime<Utc>) -> Result<ActivityReport> {
        let mut records = Vec::new();
        for platform in Platform::all() {
            let rows = self.recent_trends(Some(platform), since, ACTIVITY_ROW_LIMIT)?;
            if rows.len() == ACTIVITY_ROW_LIMIT {
                tracing::warn!(
                    platform = %platform,
                    limit = ACTIVITY_ROW_LIMIT,
                    "Activity report truncated at row limit"
                );
            }
            records.extend(rows);
        }
        Ok(ActivityReport::from_records(since, &records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(platform: Platform, topic: &str, score: f64, minutes: i64) -> TrendRecord {
        TrendRecord {
            id: None,
            platform,
            topic: topic.to_string(),
            score,
            volume: Some(10),
            source_id: topic.to_string(),
            metadata: serde_json::Value::Null,
            timestamp: t0() + Duration::minutes(minutes),
        }
    }

    fn post(title: &str, subreddit: &str, score: f64, minutes: i64) -> TrendRecord {
        TrendRecord {
            metadata: json!({ "subreddit": subreddit }),
            ..record(Platform::Reddit, title, score, minutes)
        }
    }

    #[test]
    fn test_platform_breakdown() {
        let records = vec![
            record(Platform::Twitter, "#Rust", 40.0, 0),
            record(Platform::Twitter, "#rust", 80.0, 30),
            record(Platform::Twitter, "#Go", 60.0, 10),
            post("Ferris", "rust", 20.0, 0),
            post("Borrowck", "rust", 50.0, 5),
            post("Gophers", "golang", 70.0, 5),
        ];

        let report = ActivityReport::from_records(t0(), &records);
        assert_eq!(report.total_records, 6);
        // "#Rust" and "#rust" are one topic
        assert_eq!(report.unique_topics, 5);
        assert_eq!(report.max_score, 80.0);
        assert!((report.avg_score - 320.0 / 6.0).abs() < 1e-9);

        let twitter = report.platform(Platform::Twitter).unwrap();
        assert_eq!(twitter.records, 3);
        assert_eq!(twitter.unique_topics, 2);
        assert_eq!(twitter.avg_score, 60.0);
        assert_eq!(twitter.top_trend.as_deref(), Some("#rust"));
        assert_eq!(twitter.top_subreddit, None);

        let reddit = report.platform(Platform::Reddit).unwrap();
        assert_eq!(reddit.records, 3);
        assert_eq!(reddit.max_score, 70.0);
        assert_eq!(reddit.top_trend.as_deref(), Some("Gophers"));
        assert_eq!(reddit.top_subreddit.as_deref(), Some("rust"));

        let top: Vec<&str> = report.top_records.iter().map(|r| r.topic.as_str()).collect();
        assert_eq!(top[..3], ["#rust", "Gophers", "#Go"]);
    }

    #[test]
    fn test_top_records_capped() {
        let records: Vec<TrendRecord> = (0..15)
            .map(|i| record(Platform::Twitter, &format!("#t{i}"), i as f64, i))
            .collect();

        let report = ActivityReport::from_records(t0(), &records);
        assert_eq!(report.top_records.len(), TOP_RECORDS);
        assert_eq!(report.top_records[0].topic, "#t14");
        assert!(report.platform(Platform::Reddit).is_none());
    }

    #[test]
    fn test_subreddit_tie_goes_to_first_name() {
        let records = vec![post("a", "zig", 1.0, 0), post("b", "ada", 1.0, 1)];
        let report = ActivityReport::from_records(t0(), &records);
        assert_eq!(
            report.platform(Platform::Reddit).unwrap().top_subreddit.as_deref(),
            Some("ada")
        );
    }

    #[test]
    fn test_empty_window() {
        let report = ActivityReport::from_records(t0(), &[]);
        assert!(report.is_empty());
        assert!(report.platforms.is_empty());
        assert_eq!(report.avg_score, 0.0);
    }
}
