//! End-to-end scenarios for the scorer and trend tracker

use chrono::Duration;
use trendbot::analytics::{
    ClassificationEvent, Score, ScoreBreakdown, Scorer, TopicState, TrackerConfig, TrendError,
    TrendTracker,
};
use trendbot::models::{Platform, TopicId};

mod common;
use common::{snapshot, t0};

fn tracker() -> TrendTracker {
    TrendTracker::new(TrackerConfig::default()).unwrap()
}

/// Observe a fixed score for a Twitter topic `minutes` after t0
fn observe(
    tracker: &mut TrendTracker,
    name: &str,
    minutes: i64,
    value: f64,
) -> Option<ClassificationEvent> {
    let at = t0() + Duration::minutes(minutes);
    let score = Score {
        value,
        snapshot: snapshot(Platform::Twitter, name, at, 100, 100, 0),
        breakdown: ScoreBreakdown {
            engagement: 0.5,
            velocity: 0.5,
            recency: 1.0,
        },
    };
    tracker
        .observe(&TopicId::new(Platform::Twitter, name), score, at)
        .unwrap()
}

/// Emerges at 10min, settles at 40min, emerges again at 60min
fn re_emerge(tracker: &mut TrendTracker, name: &str) -> Vec<ClassificationEvent> {
    [(0, 40.0), (10, 70.0), (20, 70.0), (30, 70.0), (40, 70.0), (50, 70.0), (60, 90.0)]
        .into_iter()
        .filter_map(|(minutes, value)| observe(tracker, name, minutes, value))
        .collect()
}

#[test]
fn test_topic_x_lifecycle() {
    let scorer = Scorer::default();
    let mut tracker = tracker();
    let x = TopicId::new(Platform::Twitter, "X");

    // t=0: quiet first sighting
    let first = snapshot(Platform::Twitter, "X", t0(), 10, 5, 0).with_age_minutes(0.0);
    let (score, event) = tracker.ingest(&scorer, first).unwrap();
    assert!(score.value < 60.0, "first score {} should be modest", score.value);
    assert!(event.is_none());
    assert_eq!(tracker.history(&x).unwrap().state(), TopicState::New);

    // t=30min: volume and engagement surge
    let surge = snapshot(Platform::Twitter, "X", t0() + Duration::minutes(30), 200, 5000, 1000)
        .with_age_minutes(30.0);
    let (score, event) = tracker.ingest(&scorer, surge).unwrap();
    assert!(score.value >= 60.0);
    let event = event.expect("surge should emit an event");
    assert_eq!(event.topic_id, x);
    assert_eq!(event.old_state, TopicState::New);
    assert_eq!(event.new_state, TopicState::Emerging);
    assert!(event.is_emergence());

    // t=24h: idle well past the 6h inactivity window
    let removed = tracker.garbage_collect(t0() + Duration::hours(24));
    assert_eq!(removed, vec![x.clone()]);
    assert!(tracker.history(&x).is_none());
    assert!(tracker.is_empty());
}

#[test]
fn test_same_name_on_two_platforms_is_two_topics() {
    let scorer = Scorer::default();
    let mut tracker = tracker();

    tracker
        .ingest(&scorer, snapshot(Platform::Twitter, "Rust", t0(), 10, 10, 0))
        .unwrap();
    tracker
        .ingest(&scorer, snapshot(Platform::Reddit, "Rust", t0(), 10, 10, 0))
        .unwrap();

    assert_eq!(tracker.len(), 2);
}

#[test]
fn test_out_of_order_observation_is_rejected() {
    let scorer = Scorer::default();
    let mut tracker = tracker();

    tracker
        .ingest(&scorer, snapshot(Platform::Reddit, "late", t0(), 10, 10, 0))
        .unwrap();
    let err = tracker
        .ingest(
            &scorer,
            snapshot(Platform::Reddit, "late", t0() - Duration::minutes(1), 10, 10, 0),
        )
        .unwrap_err();

    assert!(matches!(err, TrendError::OutOfOrderObservation { .. }));
    assert_eq!(tracker.history(&TopicId::new(Platform::Reddit, "late")).unwrap().len(), 1);
}

#[test]
fn test_stale_then_collected() {
    let scorer = Scorer::default();
    let mut tracker = tracker();
    let id = TopicId::new(Platform::Twitter, "#fading");

    for minutes in [0, 15] {
        tracker
            .ingest(
                &scorer,
                snapshot(Platform::Twitter, "#fading", t0() + Duration::minutes(minutes), 100, 100, 10),
            )
            .unwrap();
    }

    let events = tracker.refresh(t0() + Duration::hours(7));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].new_state, TopicState::Stale);

    // Stale but not yet idle for the GC threshold
    assert!(tracker.garbage_collect(t0() + Duration::hours(8)).is_empty());
    assert_eq!(tracker.garbage_collect(t0() + Duration::hours(13)), vec![id]);
}

#[test]
fn test_daily_summary_ranks_by_peak_score() {
    let scorer = Scorer::default();
    let mut tracker = tracker();

    // Both surge; "big" reaches the higher peak
    for (name, peak_engagement) in [("small", 3_000), ("big", 9_000)] {
        tracker
            .ingest(&scorer, snapshot(Platform::Twitter, name, t0(), 10, 1, 0))
            .unwrap();
        let (_, event) = tracker
            .ingest(
                &scorer,
                snapshot(
                    Platform::Twitter,
                    name,
                    t0() + Duration::minutes(20),
                    400,
                    peak_engagement,
                    peak_engagement / 5,
                ),
            )
            .unwrap();
        assert_eq!(event.unwrap().new_state, TopicState::Emerging);
    }
    // Never emerges, never listed
    tracker
        .ingest(&scorer, snapshot(Platform::Reddit, "quiet", t0(), 1, 1, 0))
        .unwrap();

    let summary = tracker.daily_summary(t0() + Duration::hours(1));
    let ranked: Vec<&str> = summary.top_topics.iter().map(|e| e.topic_id.name()).collect();

    assert_eq!(ranked, vec!["big", "small"]);
    assert!(summary.top_topics[0].peak_score >= summary.top_topics[1].peak_score);
    assert_eq!(summary.tracked_topics, 3);
    assert_eq!(summary.count(TopicState::New), 1);
}

#[test]
fn test_warm_start_restores_state_without_events() {
    let scorer = Scorer::default();
    let mut live = tracker();
    let mut scores = Vec::new();

    for (minutes, volume, engagement) in [(0, 10, 1), (20, 400, 9_000)] {
        let (score, _) = live
            .ingest(
                &scorer,
                snapshot(
                    Platform::Twitter,
                    "#replay",
                    t0() + Duration::minutes(minutes),
                    volume,
                    engagement,
                    0,
                ),
            )
            .unwrap();
        scores.push(score);
    }

    let restored =
        TrendTracker::warm_start(TrackerConfig::default(), || Ok::<_, TrendError>(scores)).unwrap();
    let id = TopicId::new(Platform::Twitter, "#replay");

    assert_eq!(
        restored.history(&id).unwrap().state(),
        live.history(&id).unwrap().state()
    );
    assert_eq!(restored.history(&id).unwrap().len(), 2);
}

#[test]
fn test_steady_topic_emits_one_event() {
    let mut tracker = tracker();

    let events: Vec<ClassificationEvent> = (0..6)
        .filter_map(|i| observe(&mut tracker, "#steady", i * 10, 50.0))
        .collect();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].old_state, TopicState::New);
    assert_eq!(events[0].new_state, TopicState::Established);
    assert_eq!(
        tracker
            .history(&TopicId::new(Platform::Twitter, "#steady"))
            .unwrap()
            .state(),
        TopicState::Established
    );
}

#[test]
fn test_re_emergence_is_counted_twice() {
    let mut tracker = tracker();

    let events = re_emerge(&mut tracker, "#again");
    let transitions: Vec<(TopicState, TopicState)> =
        events.iter().map(|e| (e.old_state, e.new_state)).collect();
    assert_eq!(
        transitions,
        vec![
            (TopicState::New, TopicState::Emerging),
            (TopicState::Emerging, TopicState::Established),
            (TopicState::Established, TopicState::Emerging),
        ]
    );
    assert!(events[2].is_emergence());

    let history = tracker
        .history(&TopicId::new(Platform::Twitter, "#again"))
        .unwrap();
    assert_eq!(
        history.emergences_between(t0(), t0() + Duration::minutes(60)),
        2
    );
}

#[test]
fn test_summary_breaks_peak_ties_by_emergence_count() {
    let mut tracker = tracker();

    // "a" emerges once and peaks at 90
    observe(&mut tracker, "a", 0, 40.0);
    let event = observe(&mut tracker, "a", 10, 90.0).unwrap();
    assert_eq!(event.new_state, TopicState::Emerging);

    // "b" emerges twice and also peaks at 90
    re_emerge(&mut tracker, "b");

    let summary = tracker.daily_summary(t0() + Duration::minutes(60));
    let ranked: Vec<(&str, usize)> = summary
        .top_topics
        .iter()
        .map(|e| (e.topic_id.name(), e.emergences))
        .collect();

    assert_eq!(ranked, vec![("b", 2), ("a", 1)]);
    assert_eq!(summary.top_topics[0].peak_score, summary.top_topics[1].peak_score);
}
