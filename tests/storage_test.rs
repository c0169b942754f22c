//! SQLite storage tests against a file-backed database

use chrono::Duration;
use tempfile::TempDir;
use trendbot::analytics::{Score, ScoreBreakdown, Scorer, ScoringConfig, TrackerConfig, TrendTracker};
use trendbot::models::{MetricSnapshot, Platform, TopicId};
use trendbot::storage::{TrendRecord, TrendStore};

mod common;
use common::{collected, scored, snapshot, t0};

fn open(dir: &TempDir) -> TrendStore {
    TrendStore::open(dir.path().join("nested").join("trends.db")).unwrap()
}

#[test]
fn test_open_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let _store = open(&dir);
    assert!(dir.path().join("nested").join("trends.db").exists());
}

#[test]
fn test_observations_survive_reopen_and_warm_start() {
    let dir = TempDir::new().unwrap();
    let scorer = Scorer::default();

    {
        let store = open(&dir);
        let mut tracker = TrendTracker::new(TrackerConfig::default()).unwrap();
        for (minutes, volume, engagement) in [(0, 10, 1), (20, 400, 9_000)] {
            let (score, _) = tracker
                .ingest(
                    &scorer,
                    snapshot(
                        Platform::Reddit,
                        "Rust 2.0",
                        t0() + Duration::minutes(minutes),
                        volume,
                        engagement,
                        volume,
                    ),
                )
                .unwrap();
            store.record_observation(&score).unwrap();
        }
    }

    let store = open(&dir);
    let loaded = store
        .load_observations_since(t0() - Duration::hours(1))
        .unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded[0].snapshot.observed_at < loaded[1].snapshot.observed_at);

    let tracker = TrendTracker::warm_start(TrackerConfig::default(), || {
        store.load_observations_since(t0() - Duration::hours(1))
    })
    .unwrap();
    let history = tracker
        .history(&TopicId::new(Platform::Reddit, "rust 2.0"))
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[test]
fn test_trend_records_and_top_trends() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let records = vec![
        TrendRecord::from_collected(&collected("#Rust", t0(), 100, 50), 40.0),
        TrendRecord::from_collected(&collected("#Rust", t0() + Duration::minutes(30), 200, 90), 75.5),
        TrendRecord::from_collected(&collected("#Go", t0(), 80, 20), 55.0),
    ];
    assert_eq!(store.save_trends_batch(&records).unwrap(), 3);

    let top = store
        .top_trends(Some(Platform::Twitter), t0() - Duration::hours(1), 10)
        .unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].topic, "#Rust");
    assert_eq!(top[0].max_score, 75.5);
    assert_eq!(top[0].mentions, 2);

    let recent = store.recent_trends(None, t0() - Duration::hours(1), 10).unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].timestamp, t0() + Duration::minutes(30));

    let labels = store.topic_labels(t0() - Duration::hours(1)).unwrap();
    assert_eq!(
        labels.get(&TopicId::new(Platform::Twitter, "#rust")).map(String::as_str),
        Some("#Rust")
    );

    assert!(store
        .top_trends(Some(Platform::Reddit), t0() - Duration::hours(1), 10)
        .unwrap()
        .is_empty());
}

#[test]
fn test_prune_before_removes_old_rows() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let old = t0() - Duration::hours(72);
    store
        .save_trends_batch(&[
            TrendRecord::from_collected(&collected("#old", old, 1, 1), 10.0),
            TrendRecord::from_collected(&collected("#new", t0(), 1, 1), 10.0),
        ])
        .unwrap();
    store
        .record_observations(&[
            scored(snapshot(Platform::Twitter, "#old", old, 1, 1, 0)),
            scored(snapshot(Platform::Twitter, "#new", t0(), 1, 1, 0)),
        ])
        .unwrap();

    let removed = store.prune_before(t0() - Duration::hours(48)).unwrap();
    assert_eq!(removed, 2);

    let stats = store.stats().unwrap();
    assert_eq!(stats.trends, 1);
    assert_eq!(stats.observations, 1);
}

#[test]
fn test_rescore_with_new_weights() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    store
        .record_observations(&[
            scored(snapshot(Platform::Twitter, "#a", t0(), 10, 10, 0)),
            scored(snapshot(Platform::Twitter, "#b", t0(), 10, 5_000, 0)),
        ])
        .unwrap();

    let engagement_only = Scorer::new(ScoringConfig {
        engagement_weight: 1.0,
        velocity_weight: 0.0,
        recency_weight: 0.0,
        ..Default::default()
    })
    .unwrap();

    let report = store.rescore(&engagement_only).unwrap();
    assert_eq!(report.rescored, 2);
    assert_eq!(report.rejected, 0);

    let reloaded = store.load_observations_since(t0() - Duration::hours(1)).unwrap();
    for score in reloaded {
        let expected = engagement_only.score(&score.snapshot, None).unwrap();
        assert_eq!(score.value, expected.value);
    }
}

#[test]
fn test_rescore_skips_rejected_rows_as_velocity_base() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let scorer = Scorer::default();

    let first = snapshot(Platform::Twitter, "#a", t0(), 100, 10, 0);
    let corrupt = Score {
        value: 50.0,
        snapshot: snapshot(Platform::Twitter, "#a", t0() + Duration::minutes(30), -5, 10, 0),
        breakdown: ScoreBreakdown {
            engagement: 0.5,
            velocity: 0.5,
            recency: 0.5,
        },
    };
    let last = snapshot(Platform::Twitter, "#a", t0() + Duration::minutes(60), 400, 10, 0);

    store
        .record_observations(&[
            scorer.score(&first, None).unwrap(),
            corrupt,
            scorer.score(&last, Some(&first)).unwrap(),
        ])
        .unwrap();

    let report = store.rescore(&scorer).unwrap();
    assert_eq!(report.rescored, 2);
    assert_eq!(report.rejected, 1);

    let reloaded = store.load_observations_since(t0() - Duration::hours(1)).unwrap();
    assert_eq!(reloaded.len(), 3);
    let expected = scorer.score(&last, Some(&first)).unwrap();
    assert_eq!(reloaded[2].snapshot.observed_at, last.observed_at);
    assert_eq!(reloaded[2].breakdown.velocity, expected.breakdown.velocity);
    assert_eq!(reloaded[2].value, expected.value);
    // The rejected row keeps what was stored
    assert_eq!(reloaded[1].value, 50.0);
}

#[test]
fn test_unknown_volume_round_trips_as_null() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let quiet = MetricSnapshot::new(Platform::Twitter, "Eclipse", t0()).with_engagement(40, 4);
    store.record_observation(&scored(quiet.clone())).unwrap();
    store
        .save_trends_batch(&[TrendRecord::from_collected(
            &trendbot::models::CollectedTopic::new(quiet, "Eclipse"),
            30.0,
        )])
        .unwrap();

    let loaded = store.load_observations_since(t0() - Duration::hours(1)).unwrap();
    assert_eq!(loaded[0].snapshot.volume, None);

    let recent = store.recent_trends(None, t0() - Duration::hours(1), 10).unwrap();
    assert_eq!(recent[0].volume, None);
}

#[test]
fn test_activity_report_over_stored_records() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let post = trendbot::models::CollectedTopic::new(
        snapshot(Platform::Reddit, "t3_abc", t0(), 12, 300, 12),
        "Ferris turns ten",
    )
    .with_source_id("abc")
    .with_metadata(serde_json::json!({ "subreddit": "rust" }));

    store
        .save_trends_batch(&[
            TrendRecord::from_collected(&collected("#Rust", t0(), 100, 50), 40.0),
            TrendRecord::from_collected(&collected("#Go", t0() + Duration::minutes(5), 80, 20), 70.0),
            TrendRecord::from_collected(&collected("#old", t0() - Duration::hours(30), 1, 1), 99.0),
            TrendRecord::from_collected(&post, 55.0),
        ])
        .unwrap();

    let report = store.activity_report(t0() - Duration::hours(24)).unwrap();
    assert_eq!(report.total_records, 3);
    assert_eq!(report.max_score, 70.0);

    let twitter = report.platform(Platform::Twitter).unwrap();
    assert_eq!(twitter.records, 2);
    assert_eq!(twitter.top_trend.as_deref(), Some("#Go"));

    let reddit = report.platform(Platform::Reddit).unwrap();
    assert_eq!(reddit.top_subreddit.as_deref(), Some("rust"));
    assert_eq!(report.top_records[0].topic, "#Go");
}
