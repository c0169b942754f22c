//! Stateful emerging-trend detection
//!
//! The [`TrendTracker`] owns a rolling score history per topic. Every
//! observation updates the history, recomputes the topic's velocity in score
//! points per minute and reclassifies its [`TopicState`]. A
//! [`ClassificationEvent`] is returned only when the state actually changes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info};

use super::error::{TrendError, TrendResult};
use super::scorer::{Score, Scorer};
use super::state::{ClassificationEvent, TopicState};
use crate::models::{MetricSnapshot, TopicId};

/// Thresholds and windows used for classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How many entries back velocity is measured against
    pub velocity_lookback: usize,

    /// Velocity (points/minute) above which a topic can be EMERGING
    pub emerging_velocity: f64,

    /// Minimum score for EMERGING
    pub emerging_min_score: f64,

    /// Velocity magnitude (points/minute) below which a topic is DECLINING
    pub decline_velocity: f64,

    /// No observation for this long makes a topic STALE
    pub inactivity_hours: u32,

    /// History entries older than this are evicted
    pub retention_hours: u32,

    /// Idle time after which garbage collection drops a topic
    pub gc_hours: u32,

    /// Trailing window covered by the daily summary
    pub summary_window_hours: u32,

    /// Maximum topics listed in the daily summary
    pub summary_top_k: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            velocity_lookback: 3,
            emerging_velocity: 0.25,
            emerging_min_score: 60.0,
            decline_velocity: 0.1,
            inactivity_hours: 6,
            retention_hours: 48,
            gc_hours: 12,
            summary_window_hours: 24,
            summary_top_k: 10,
        }
    }
}

impl TrackerConfig {
    pub fn inactivity(&self) -> Duration {
        Duration::hours(i64::from(self.inactivity_hours))
    }

    pub fn retention(&self) -> Duration {
        Duration::hours(i64::from(self.retention_hours))
    }

    pub fn gc_threshold(&self) -> Duration {
        Duration::hours(i64::from(self.gc_hours))
    }

    pub fn summary_window(&self) -> Duration {
        Duration::hours(i64::from(self.summary_window_hours))
    }

    pub fn validate(&self) -> TrendResult<()> {
        if self.velocity_lookback == 0 {
            return Err(TrendError::invalid_config(
                "velocity_lookback",
                "must be at least 1",
            ));
        }

        for (field, value) in [
            ("emerging_velocity", self.emerging_velocity),
            ("decline_velocity", self.decline_velocity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TrendError::invalid_config(
                    field,
                    format!("must be a non-negative number, got {value}"),
                ));
            }
        }

        if !(0.0..=100.0).contains(&self.emerging_min_score) {
            return Err(TrendError::invalid_config(
                "emerging_min_score",
                format!("must be within 0-100, got {}", self.emerging_min_score),
            ));
        }

        if self.inactivity_hours == 0 {
            return Err(TrendError::invalid_config("inactivity_hours", "must be > 0"));
        }
        if self.gc_hours < self.inactivity_hours || self.gc_hours > self.retention_hours {
            return Err(TrendError::invalid_config(
                "gc_hours",
                format!(
                    "must be between inactivity_hours ({}) and retention_hours ({}), got {}",
                    self.inactivity_hours, self.retention_hours, self.gc_hours
                ),
            ));
        }
        if self.summary_window_hours == 0 || self.summary_window_hours > self.retention_hours {
            return Err(TrendError::invalid_config(
                "summary_window_hours",
                format!(
                    "must be between 1 and retention_hours ({}), got {}",
                    self.retention_hours, self.summary_window_hours
                ),
            ));
        }
        if self.summary_top_k == 0 {
            return Err(TrendError::invalid_config("summary_top_k", "must be at least 1"));
        }

        Ok(())
    }
}

/// One scored observation in a topic's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub score: Score,
    pub timestamp: DateTime<Utc>,
}

/// Rolling history and current classification of one topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicHistory {
    topic_id: TopicId,

    /// Strictly increasing in timestamp
    entries: VecDeque<HistoryEntry>,

    state: TopicState,
    velocity: f64,

    /// Times the topic transitioned into EMERGING
    emergences: VecDeque<DateTime<Utc>>,
}

impl TopicHistory {
    fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            entries: VecDeque::new(),
            state: TopicState::New,
            velocity: 0.0,
            emergences: VecDeque::new(),
        }
    }

    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// State as of the last observe/refresh
    pub fn state(&self) -> TopicState {
        self.state
    }

    /// Score points per minute as of the last observation
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn last_observed_at(&self) -> Option<DateTime<Utc>> {
        self.latest().map(|e| e.timestamp)
    }

    /// Number of EMERGING transitions within `[from, to]`
    pub fn emergences_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> usize {
        self.emergences
            .iter()
            .filter(|at| **at >= from && **at <= to)
            .count()
    }

    /// Highest score recorded within `[from, to]`
    pub fn peak_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<f64> {
        self.entries
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= to)
            .map(|e| e.score.value)
            .reduce(f64::max)
    }

    fn evict_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        while self.entries.front().is_some_and(|e| e.timestamp < cutoff) {
            self.entries.pop_front();
        }
        while self.emergences.front().is_some_and(|at| *at < cutoff) {
            self.emergences.pop_front();
        }
        before - self.entries.len()
    }

    /// Snapshot to score the next observation at `at` against
    fn previous_snapshot(&self, at: DateTime<Utc>) -> Option<&MetricSnapshot> {
        let mut newest_first = self.entries.iter().rev();
        match newest_first.next() {
            Some(latest) if latest.timestamp < at => Some(&latest.score.snapshot),
            // Re-delivery replaces the latest entry, so score against the one before it.
            Some(_) => newest_first.next().map(|e| &e.score.snapshot),
            None => None,
        }
    }

    fn compute_velocity(&self, lookback: usize) -> f64 {
        let len = self.entries.len();
        if len < 2 {
            return 0.0;
        }

        let latest = &self.entries[len - 1];
        let base = &self.entries[(len - 1).saturating_sub(lookback)];

        let elapsed_minutes =
            ((latest.timestamp - base.timestamp).num_milliseconds() as f64 / 60_000.0).max(1.0);
        (latest.score.value - base.score.value) / elapsed_minutes
    }

    fn classify(&self, now: DateTime<Utc>, config: &TrackerConfig) -> TopicState {
        let Some(latest) = self.latest() else {
            return TopicState::New;
        };
        if self.entries.len() < 2 {
            return TopicState::New;
        }
        if now - latest.timestamp > config.inactivity() {
            return TopicState::Stale;
        }
        if self.velocity > config.emerging_velocity
            && latest.score.value >= config.emerging_min_score
        {
            return TopicState::Emerging;
        }
        if self.velocity < -config.decline_velocity {
            return TopicState::Declining;
        }
        TopicState::Established
    }

    /// Apply a newly classified state, returning an event on change
    fn transition(&mut self, new_state: TopicState, at: DateTime<Utc>) -> Option<ClassificationEvent> {
        let old_state = self.state;
        if new_state == old_state {
            return None;
        }

        self.state = new_state;
        if new_state == TopicState::Emerging {
            self.emergences.push_back(at);
        }

        Some(ClassificationEvent {
            topic_id: self.topic_id.clone(),
            old_state,
            new_state,
            score: self.latest().map_or(0.0, |e| e.score.value),
            velocity: self.velocity,
            at,
        })
    }
}

/// A topic listed in the daily summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub topic_id: TopicId,
    pub peak_score: f64,
    pub emergences: usize,
    pub state: TopicState,
    pub latest_score: f64,
}

/// Read-only digest of the trailing summary window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub as_of: DateTime<Utc>,
    pub window_start: DateTime<Utc>,

    /// Topics that emerged in the window, best peak score first
    pub top_topics: Vec<SummaryEntry>,

    /// Tracked topics per state, classified at `as_of`
    pub state_counts: BTreeMap<TopicState, usize>,

    pub tracked_topics: usize,
}

impl DailySummary {
    pub fn count(&self, state: TopicState) -> usize {
        self.state_counts.get(&state).copied().unwrap_or(0)
    }
}

/// Owner of all per-topic histories
#[derive(Debug, Clone)]
pub struct TrendTracker {
    config: TrackerConfig,
    topics: HashMap<TopicId, TopicHistory>,
}

impl TrendTracker {
    /// Create an empty tracker
    pub fn new(config: TrackerConfig) -> TrendResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            topics: HashMap::new(),
        })
    }

    /// Rebuild a tracker from persisted observations
    ///
    /// Observations are replayed oldest first; classification events produced
    /// during the replay are discarded.
    pub fn warm_start<F, E>(config: TrackerConfig, loader: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<Vec<Score>, E>,
        E: From<TrendError>,
    {
        let mut tracker = Self::new(config)?;
        let mut scores = loader()?;
        scores.sort_by(|a, b| {
            a.snapshot
                .observed_at
                .cmp(&b.snapshot.observed_at)
                .then_with(|| a.snapshot.topic_id.cmp(&b.snapshot.topic_id))
        });

        let replayed = scores.len();
        for score in scores {
            let topic_id = score.snapshot.topic_id.clone();
            let at = score.snapshot.observed_at;
            tracker.observe(&topic_id, score, at)?;
        }

        info!(
            observations = replayed,
            topics = tracker.len(),
            "Trend tracker warm-started"
        );
        Ok(tracker)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of tracked topics
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Read-only view of a topic's history
    pub fn history(&self, topic_id: &TopicId) -> Option<&TopicHistory> {
        self.topics.get(topic_id)
    }

    pub fn topics(&self) -> impl Iterator<Item = &TopicHistory> {
        self.topics.values()
    }

    /// Record a score for a topic
    ///
    /// An observation at the same timestamp as the latest entry replaces it.
    ///
    /// # Errors
    ///
    /// [`TrendError::OutOfOrderObservation`] when `timestamp` is older than
    /// the topic's latest entry; [`TrendError::InvalidMetric`] when the score
    /// belongs to a different topic.
    pub fn observe(
        &mut self,
        topic_id: &TopicId,
        score: Score,
        timestamp: DateTime<Utc>,
    ) -> TrendResult<Option<ClassificationEvent>> {
        if &score.snapshot.topic_id != topic_id {
            return Err(TrendError::invalid_metric(
                "topic_id",
                format!(
                    "score for {} observed as {}",
                    score.snapshot.topic_id, topic_id
                ),
            ));
        }
        self.check_order(topic_id, timestamp)?;

        let config = &self.config;
        let history = self
            .topics
            .entry(topic_id.clone())
            .or_insert_with(|| TopicHistory::new(topic_id.clone()));

        let entry = HistoryEntry { score, timestamp };
        if history.last_observed_at() == Some(timestamp) {
            debug!(topic = %topic_id, "Replacing re-delivered observation");
            history.entries.pop_back();
        }
        history.entries.push_back(entry);
        history.evict_before(timestamp - config.retention());

        history.velocity = history.compute_velocity(config.velocity_lookback);
        let new_state = history.classify(timestamp, config);
        let event = history.transition(new_state, timestamp);

        if let Some(event) = &event {
            debug!(
                topic = %event.topic_id,
                from = %event.old_state,
                to = %event.new_state,
                score = event.score,
                velocity = event.velocity,
                "Topic state changed"
            );
        }
        Ok(event)
    }

    /// Score a snapshot against the topic's previous one and observe it
    pub fn ingest(
        &mut self,
        scorer: &Scorer,
        snapshot: MetricSnapshot,
    ) -> TrendResult<(Score, Option<ClassificationEvent>)> {
        let topic_id = snapshot.topic_id.clone();
        let at = snapshot.observed_at;
        self.check_order(&topic_id, at)?;

        let previous = self
            .topics
            .get(&topic_id)
            .and_then(|h| h.previous_snapshot(at));
        let score = scorer.score(&snapshot, previous)?;

        let event = self.observe(&topic_id, score.clone(), at)?;
        Ok((score, event))
    }

    /// Reclassify every topic at `now`
    ///
    /// Surfaces STALE transitions for topics that stopped being observed.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Vec<ClassificationEvent> {
        let config = &self.config;
        let mut events: Vec<ClassificationEvent> = self
            .topics
            .values_mut()
            .filter_map(|history| {
                let state = history.classify(now, config);
                history.transition(state, now)
            })
            .collect();

        events.sort_by(|a, b| a.topic_id.cmp(&b.topic_id));
        events
    }

    /// Evict aged-out entries and drop idle topics
    ///
    /// Returns the removed topic ids, sorted.
    pub fn garbage_collect(&mut self, now: DateTime<Utc>) -> Vec<TopicId> {
        let cutoff = now - self.config.retention();
        let gc_threshold = self.config.gc_threshold();
        let inactivity = self.config.inactivity();

        let mut removed = Vec::new();
        self.topics.retain(|topic_id, history| {
            history.evict_before(cutoff);

            let keep = match history.last_observed_at() {
                None => false,
                Some(last) => {
                    let idle = now - last;
                    !(idle > inactivity && idle >= gc_threshold)
                }
            };
            if !keep {
                removed.push(topic_id.clone());
            }
            keep
        });

        removed.sort();
        if !removed.is_empty() {
            info!(
                removed = removed.len(),
                remaining = self.topics.len(),
                "Garbage-collected idle topics"
            );
        }
        removed
    }

    /// Topics that emerged in the trailing window, ranked by peak score
    pub fn daily_summary(&self, as_of: DateTime<Utc>) -> DailySummary {
        let window_start = as_of - self.config.summary_window();

        let mut state_counts: BTreeMap<TopicState, usize> =
            TopicState::all().into_iter().map(|s| (s, 0)).collect();

        let mut top_topics = Vec::new();
        for history in self.topics.values() {
            let state = history.classify(as_of, &self.config);
            *state_counts.entry(state).or_insert(0) += 1;

            let emergences = history.emergences_between(window_start, as_of);
            if emergences == 0 {
                continue;
            }

            let latest_score = history.latest().map_or(0.0, |e| e.score.value);
            top_topics.push(SummaryEntry {
                topic_id: history.topic_id.clone(),
                peak_score: history
                    .peak_between(window_start, as_of)
                    .unwrap_or(latest_score),
                emergences,
                state,
                latest_score,
            });
        }

        top_topics.sort_by(|a, b| {
            b.peak_score
                .total_cmp(&a.peak_score)
                .then_with(|| b.emergences.cmp(&a.emergences))
                .then_with(|| a.topic_id.cmp(&b.topic_id))
        });
        top_topics.truncate(self.config.summary_top_k);

        DailySummary {
            as_of,
            window_start,
            top_topics,
            state_counts,
            tracked_topics: self.topics.len(),
        }
    }

    fn check_order(&self, topic_id: &TopicId, timestamp: DateTime<Utc>) -> TrendResult<()> {
        if let Some(last) = self.topics.get(topic_id).and_then(|h| h.last_observed_at()) {
            if timestamp < last {
                return Err(TrendError::OutOfOrderObservation {
                    topic_id: topic_id.clone(),
                    last,
                    attempted: timestamp,
                });
            }
        }
        Ok(())
    }
}
