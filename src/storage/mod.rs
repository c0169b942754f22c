//! SQLite persistence for raw trend records and scored observations
//!
//! Two tables:
//!
//! - `trends`: one row per collected topic per poll, with the display name,
//!   upstream id and platform metadata. Backs the `top` command and the
//!   daily digest labels.
//! - `observations`: the raw metrics and score breakdown of every scored
//!   snapshot. Backs tracker warm start and re-scoring.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that text
//! comparison orders them chronologically.

mod activity;

pub use activity::{ActivityReport, PlatformActivity, ACTIVITY_ROW_LIMIT, TOP_RECORDS};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::analytics::{Score, ScoreBreakdown, Scorer};
use crate::models::{CollectedTopic, MetricSnapshot, Platform, TopicId};

/// Format a timestamp for storage
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp '{raw}'"))
}

/// One collected topic as stored in the `trends` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub id: Option<i64>,
    pub platform: Platform,
    /// Display name (hashtag or post title)
    pub topic: String,
    pub score: f64,
    pub volume: Option<i64>,
    pub source_id: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl TrendRecord {
    /// Build a record for a collected topic and its score
    pub fn from_collected(topic: &CollectedTopic, score: f64) -> Self {
        Self {
            id: None,
            platform: topic.snapshot.platform,
            topic: topic.display_name.clone(),
            score,
            volume: topic.snapshot.volume,
            source_id: topic.source_id.clone(),
            metadata: topic.metadata.clone(),
            timestamp: topic.snapshot.observed_at,
        }
    }

    /// Platform-qualified id the record maps to
    pub fn topic_id(&self) -> TopicId {
        TopicId::new(self.platform, &self.topic)
    }
}

/// Aggregated row returned by [`TrendStore::top_trends`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTrend {
    pub topic: String,
    pub platform: Platform,
    pub max_score: f64,
    pub mentions: u64,
}

/// Outcome of [`TrendStore::rescore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RescoreReport {
    pub rescored: usize,
    pub rejected: usize,
}

/// Row counts for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub trends: u64,
    pub observations: u64,
    pub topics: u64,
}

/// SQLite-backed trend store
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct TrendStore {
    conn: Mutex<Connection>,
}

impl TrendStore {
    /// Open (or create) the database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "Trend database initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS trends (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    platform TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    score REAL NOT NULL DEFAULT 0,
                    volume INTEGER,
                    source_id TEXT,
                    metadata TEXT,
                    timestamp TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                );

                CREATE INDEX IF NOT EXISTS idx_platform_timestamp
                    ON trends(platform, timestamp);

                CREATE INDEX IF NOT EXISTS idx_topic_timestamp
                    ON trends(topic, timestamp);

                CREATE TABLE IF NOT EXISTS observations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    topic_id TEXT NOT NULL,
                    platform TEXT NOT NULL,
                    observed_at TEXT NOT NULL,
                    volume INTEGER,
                    positive INTEGER NOT NULL,
                    amplification INTEGER NOT NULL,
                    age_minutes REAL NOT NULL,
                    score REAL NOT NULL,
                    engagement REAL NOT NULL,
                    velocity REAL NOT NULL,
                    recency REAL NOT NULL,
                    UNIQUE(topic_id, observed_at)
                );

                CREATE INDEX IF NOT EXISTS idx_observations_observed_at
                    ON observations(observed_at);
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // trends
    // ------------------------------------------------------------------

    /// Insert trend records in one transaction, returning the number saved
    pub fn save_trends_batch(&self, records: &[TrendRecord]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut saved = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO trends (platform, topic, score, volume, source_id, metadata, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                saved += stmt.execute(params![
                    record.platform.as_str(),
                    record.topic,
                    record.score,
                    record.volume,
                    record.source_id,
                    record.metadata.to_string(),
                    format_timestamp(record.timestamp),
                ])?;
            }
        }
        tx.commit().context("Failed to commit trend batch")?;

        tracing::debug!(saved = saved, "Saved trends to database");
        Ok(saved)
    }

    /// Most recent trend records since `since`, newest first
    pub fn recent_trends(
        &self,
        platform: Option<Platform>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TrendRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, platform, topic, score, volume, source_id, metadata, timestamp
             FROM trends
             WHERE timestamp > ?1 AND (?2 IS NULL OR platform = ?2)
             ORDER BY timestamp DESC, score DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![
                format_timestamp(since),
                platform.map(|p| p.as_str()),
                limit as i64
            ],
            read_trend_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            match row? {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable trend row"),
            }
        }
        Ok(records)
    }

    /// Topics with the highest peak score since `since`
    pub fn top_trends(
        &self,
        platform: Option<Platform>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopTrend>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT topic, platform, MAX(score) AS max_score, COUNT(*) AS mentions
             FROM trends
             WHERE timestamp > ?1 AND (?2 IS NULL OR platform = ?2)
             GROUP BY topic, platform
             ORDER BY max_score DESC, mentions DESC, topic ASC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![
                format_timestamp(since),
                platform.map(|p| p.as_str()),
                limit as i64
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        let mut trends = Vec::new();
        for row in rows {
            let (topic, platform, max_score, mentions) = row?;
            let Some(platform) = Platform::parse(&platform) else {
                continue;
            };
            trends.push(TopTrend {
                topic,
                platform,
                max_score,
                mentions: mentions.max(0) as u64,
            });
        }
        Ok(trends)
    }

    /// Latest display name per topic id seen since `since`
    pub fn topic_labels(&self, since: DateTime<Utc>) -> Result<HashMap<TopicId, String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT platform, topic FROM trends WHERE timestamp > ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![format_timestamp(since)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut labels = HashMap::new();
        for row in rows {
            let (platform, topic) = row?;
            if let Some(platform) = Platform::parse(&platform) {
                labels.insert(TopicId::new(platform, &topic), topic);
            }
        }
        Ok(labels)
    }

    // ------------------------------------------------------------------
    // observations
    // ------------------------------------------------------------------

    /// Persist a scored snapshot; a repeat at the same timestamp replaces it
    pub fn record_observation(&self, score: &Score) -> Result<()> {
        let conn = self.conn()?;
        insert_observation(&conn, score)?;
        Ok(())
    }

    /// Persist several scored snapshots in one transaction
    pub fn record_observations(&self, scores: &[Score]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for score in scores {
            insert_observation(&tx, score)?;
        }
        tx.commit().context("Failed to commit observations")?;
        Ok(scores.len())
    }

    /// Scored observations since `since`, oldest first
    pub fn load_observations_since(&self, since: DateTime<Utc>) -> Result<Vec<Score>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, topic_id, platform, observed_at, volume, positive, amplification,
                    age_minutes, score, engagement, velocity, recency
             FROM observations
             WHERE observed_at >= ?1
             ORDER BY observed_at ASC, topic_id ASC",
        )?;

        let rows = stmt.query_map(params![format_timestamp(since)], read_observation_row)?;

        let mut scores = Vec::new();
        for row in rows {
            match row? {
                Ok((_, score)) => scores.push(score),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable observation row"),
            }
        }
        Ok(scores)
    }

    /// Delete trend records and observations older than `cutoff`
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let cutoff = format_timestamp(cutoff);
        let trends = conn.execute("DELETE FROM trends WHERE timestamp < ?1", params![cutoff])?;
        let observations = conn.execute(
            "DELETE FROM observations WHERE observed_at < ?1",
            params![cutoff],
        )?;

        if trends + observations > 0 {
            tracing::info!(trends = trends, observations = observations, "Pruned old rows");
        }
        Ok(trends + observations)
    }

    /// Recompute every stored score with `scorer`
    ///
    /// Observations are replayed per topic in time order so that velocity
    /// uses the same previous snapshot as during live scoring. Rows the
    /// scorer rejects keep their old score and never become the previous
    /// snapshot of the next row.
    pub fn rescore(&self, scorer: &Scorer) -> Result<RescoreReport> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut report = RescoreReport::default();

        let rows: Vec<(i64, Score)> = {
            let mut stmt = tx.prepare(
                "SELECT id, topic_id, platform, observed_at, volume, positive, amplification,
                        age_minutes, score, engagement, velocity, recency
                 FROM observations
                 ORDER BY topic_id ASC, observed_at ASC",
            )?;
            let mapped = stmt.query_map([], read_observation_row)?;
            let mut rows = Vec::new();
            for row in mapped {
                match row? {
                    Ok(entry) => rows.push(entry),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unreadable observation row");
                        report.rejected += 1;
                    }
                }
            }
            rows
        };

        {
            let mut update = tx.prepare(
                "UPDATE observations
                 SET score = ?1, engagement = ?2, velocity = ?3, recency = ?4
                 WHERE id = ?5",
            )?;

            let mut previous: Option<MetricSnapshot> = None;
            for (id, stored) in rows {
                let snapshot = stored.snapshot;
                let prev = previous
                    .as_ref()
                    .filter(|p| p.topic_id == snapshot.topic_id);

                match scorer.score(&snapshot, prev) {
                    Ok(score) => {
                        update.execute(params![
                            score.value,
                            score.breakdown.engagement,
                            score.breakdown.velocity,
                            score.breakdown.recency,
                            id
                        ])?;
                        report.rescored += 1;
                        previous = Some(snapshot);
                    }
                    Err(e) => {
                        tracing::warn!(observation_id = id, error = %e, "Observation rejected by scorer");
                        report.rejected += 1;
                    }
                }
            }
        }

        tx.commit().context("Failed to commit rescore")?;
        tracing::info!(
            rescored = report.rescored,
            rejected = report.rejected,
            "Rescored stored observations"
        );
        Ok(report)
    }

    /// Row counts
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let trends: i64 = conn.query_row("SELECT COUNT(*) FROM trends", [], |row| row.get(0))?;
        let observations: i64 =
            conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        let topics: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT topic_id) FROM observations",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            trends: trends.max(0) as u64,
            observations: observations.max(0) as u64,
            topics: topics.max(0) as u64,
        })
    }
}

fn insert_observation(conn: &Connection, score: &Score) -> Result<()> {
    let snapshot = &score.snapshot;
    conn.execute(
        "INSERT OR REPLACE INTO observations
            (topic_id, platform, observed_at, volume, positive, amplification,
             age_minutes, score, engagement, velocity, recency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            snapshot.topic_id.as_str(),
            snapshot.platform.as_str(),
            format_timestamp(snapshot.observed_at),
            snapshot.volume,
            snapshot.positive_engagement,
            snapshot.amplification,
            snapshot.age_minutes,
            score.value,
            score.breakdown.engagement,
            score.breakdown.velocity,
            score.breakdown.recency,
        ],
    )
    .context("Failed to record observation")?;
    Ok(())
}

/// Column decoding errors surface as `rusqlite::Error`; semantic ones
/// (unknown platform, bad timestamp) as the inner `anyhow::Error`.
fn read_trend_row(row: &Row<'_>) -> rusqlite::Result<Result<TrendRecord>> {
    let id: i64 = row.get(0)?;
    let platform: String = row.get(1)?;
    let topic: String = row.get(2)?;
    let score: f64 = row.get(3)?;
    let volume: Option<i64> = row.get(4)?;
    let source_id: Option<String> = row.get(5)?;
    let metadata: Option<String> = row.get(6)?;
    let timestamp: String = row.get(7)?;

    Ok((|| -> Result<TrendRecord> {
        let platform =
            Platform::parse(&platform).ok_or_else(|| anyhow!("Unknown platform '{platform}'"))?;
        let metadata = match metadata.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => serde_json::Value::Null,
        };
        Ok(TrendRecord {
            id: Some(id),
            platform,
            topic,
            score,
            volume,
            source_id: source_id.unwrap_or_default(),
            metadata,
            timestamp: parse_timestamp(&timestamp)?,
        })
    })())
}

fn read_observation_row(row: &Row<'_>) -> rusqlite::Result<Result<(i64, Score)>> {
    let id: i64 = row.get(0)?;
    let topic_id: String = row.get(1)?;
    let platform: String = row.get(2)?;
    let observed_at: String = row.get(3)?;
    let volume: Option<i64> = row.get(4)?;
    let positive: i64 = row.get(5)?;
    let amplification: i64 = row.get(6)?;
    let age_minutes: f64 = row.get(7)?;
    let value: f64 = row.get(8)?;
    let breakdown = ScoreBreakdown {
        engagement: row.get(9)?,
        velocity: row.get(10)?,
        recency: row.get(11)?,
    };

    Ok((|| -> Result<(i64, Score)> {
        let topic_id =
            TopicId::parse(&topic_id).ok_or_else(|| anyhow!("Invalid topic id '{topic_id}'"))?;
        let platform =
            Platform::parse(&platform).ok_or_else(|| anyhow!("Unknown platform '{platform}'"))?;
        let snapshot = MetricSnapshot {
            topic_id,
            platform,
            observed_at: parse_timestamp(&observed_at)?,
            volume,
            positive_engagement: positive,
            amplification,
            age_minutes,
        };
        Ok((
            id,
            Score {
                value,
                snapshot,
                breakdown,
            },
        ))
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn collected(platform: Platform, name: &str, at: DateTime<Utc>) -> CollectedTopic {
        let snapshot = MetricSnapshot::new(platform, name, at)
            .with_volume(100)
            .with_engagement(500, 50)
            .with_age_minutes(10.0);
        CollectedTopic::new(snapshot, name).with_metadata(serde_json::json!({"k": "v"}))
    }

    #[test]
    fn test_save_and_recent_trends() {
        let store = TrendStore::in_memory().unwrap();
        let now = Utc::now();

        let records = vec![
            TrendRecord::from_collected(&collected(Platform::Twitter, "#Rust", now), 70.0),
            TrendRecord::from_collected(&collected(Platform::Reddit, "Big News", now), 55.0),
            TrendRecord::from_collected(
                &collected(Platform::Twitter, "#Old", now - Duration::hours(30)),
                90.0,
            ),
        ];
        assert_eq!(store.save_trends_batch(&records).unwrap(), 3);

        let recent = store
            .recent_trends(None, now - Duration::hours(24), 50)
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].score, 70.0);
        assert_eq!(recent[0].metadata["k"], "v");

        let twitter_only = store
            .recent_trends(Some(Platform::Twitter), now - Duration::hours(24), 50)
            .unwrap();
        assert_eq!(twitter_only.len(), 1);
        assert_eq!(twitter_only[0].topic, "#Rust");
    }

    #[test]
    fn test_top_trends_groups_by_topic() {
        let store = TrendStore::in_memory().unwrap();
        let now = Utc::now();

        let records = vec![
            TrendRecord::from_collected(
                &collected(Platform::Twitter, "#a", now - Duration::minutes(30)),
                40.0,
            ),
            TrendRecord::from_collected(&collected(Platform::Twitter, "#a", now), 80.0),
            TrendRecord::from_collected(&collected(Platform::Twitter, "#b", now), 60.0),
        ];
        store.save_trends_batch(&records).unwrap();

        let top = store.top_trends(None, now - Duration::hours(24), 10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].topic, "#a");
        assert_eq!(top[0].max_score, 80.0);
        assert_eq!(top[0].mentions, 2);
        assert_eq!(top[1].topic, "#b");
    }

    #[test]
    fn test_observation_roundtrip_and_replace() {
        let store = TrendStore::in_memory().unwrap();
        let scorer = Scorer::default();
        let now = Utc::now();

        let snapshot = collected(Platform::Twitter, "#rust", now).snapshot;
        let score = scorer.score(&snapshot, None).unwrap();
        store.record_observation(&score).unwrap();
        store.record_observation(&score).unwrap();

        let loaded = store
            .load_observations_since(now - Duration::hours(1))
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, score.value);
        assert_eq!(loaded[0].snapshot.topic_id, snapshot.topic_id);
        assert_eq!(
            loaded[0].snapshot.observed_at.timestamp_micros(),
            now.timestamp_micros()
        );
    }

    #[test]
    fn test_prune_before() {
        let store = TrendStore::in_memory().unwrap();
        let scorer = Scorer::default();
        let now = Utc::now();

        let old = collected(Platform::Reddit, "old", now - Duration::hours(72));
        let fresh = collected(Platform::Reddit, "fresh", now);
        for topic in [&old, &fresh] {
            let score = scorer.score(&topic.snapshot, None).unwrap();
            store.record_observation(&score).unwrap();
            store
                .save_trends_batch(&[TrendRecord::from_collected(topic, score.value)])
                .unwrap();
        }

        assert_eq!(store.prune_before(now - Duration::hours(48)).unwrap(), 2);
        let stats = store.stats().unwrap();
        assert_eq!(stats.trends, 1);
        assert_eq!(stats.observations, 1);
    }

    #[test]
    fn test_rescore_uses_previous_snapshot() {
        let store = TrendStore::in_memory().unwrap();
        let scorer = Scorer::default();
        let t0 = Utc::now() - Duration::hours(2);

        let first = MetricSnapshot::new(Platform::Twitter, "#grow", t0)
            .with_volume(100)
            .with_engagement(100, 10);
        let second = MetricSnapshot::new(Platform::Twitter, "#grow", t0 + Duration::hours(1))
            .with_volume(300)
            .with_engagement(100, 10);

        // Stored without a previous snapshot: velocity sits at the neutral 0.5.
        for snapshot in [&first, &second] {
            store
                .record_observation(&scorer.score(snapshot, None).unwrap())
                .unwrap();
        }

        let report = store.rescore(&scorer).unwrap();
        assert_eq!(report, RescoreReport { rescored: 2, rejected: 0 });

        let loaded = store.load_observations_since(t0).unwrap();
        assert_eq!(loaded[0].breakdown.velocity, 0.5);
        assert!(loaded[1].breakdown.velocity > 0.5);
        assert_eq!(
            loaded[1].value,
            scorer.score(&second, Some(&first)).unwrap().value
        );
    }

    #[test]
    fn test_topic_labels() {
        let store = TrendStore::in_memory().unwrap();
        let now = Utc::now();
        store
            .save_trends_batch(&[TrendRecord::from_collected(
                &collected(Platform::Twitter, "#RustLang", now),
                50.0,
            )])
            .unwrap();

        let labels = store.topic_labels(now - Duration::hours(1)).unwrap();
        let id = TopicId::new(Platform::Twitter, "#rustlang");
        assert_eq!(labels.get(&id).map(String::as_str), Some("#RustLang"));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trends.db");
        let store = TrendStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.stats().unwrap(), StoreStats::default());
    }
}
