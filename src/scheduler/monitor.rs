//! Trend monitor: polling loops around the scorer and tracker
//!
//! Each source runs on its own interval. Collected topics are scored and
//! observed under one coarse async lock on the tracker, then persisted and
//! handed to the notifier. A maintenance loop reclassifies idle topics and
//! garbage-collects them, and a daily trigger sends the summary.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::error::{MonitorError, MonitorResult};
use super::trigger::DailyTrigger;
use crate::analytics::{ClassificationEvent, DailySummary, Score, Scorer, TrendError, TrendTracker};
use crate::config::Config;
use crate::metrics;
use crate::models::{CollectedTopic, TopicId};
use crate::notifications::NotificationManager;
use crate::sources::{fetch_guarded, SourceError, TrendSource};
use crate::storage::{ActivityReport, TrendRecord, TrendStore};
use crate::utils::circuit::CircuitBreaker;
use crate::utils::format_duration;

/// Consecutive failed polls before a source-failure alert goes out
pub const SOURCE_FAILURE_ALERT_THRESHOLD: u32 = 3;

/// Health of one source, as reported by the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub interval_minutes: u64,
    pub circuit: &'static str,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct SourceSlot {
    source: Box<dyn TrendSource>,
    breaker: CircuitBreaker,
    interval: Duration,
    consecutive_failures: AtomicU32,
    last_success: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
}

impl SourceSlot {
    fn status(&self) -> SourceStatus {
        SourceStatus {
            name: self.source.name().to_string(),
            interval_minutes: self.interval.as_secs() / 60,
            circuit: self.breaker.state().as_str(),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_success: *self.last_success.read().unwrap_or_else(|e| e.into_inner()),
            last_error: self
                .last_error
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }
}

/// Outcome of ingesting one batch of collected topics
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollReport {
    pub source: String,
    pub collected: usize,
    pub scored: usize,
    pub rejected: usize,
    pub events: Vec<ClassificationEvent>,
    pub alerted: bool,
}

impl PollReport {
    pub fn emerging(&self) -> usize {
        self.events.iter().filter(|e| e.is_emergence()).count()
    }
}

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub events: Vec<ClassificationEvent>,
    pub removed: Vec<TopicId>,
    pub pruned_rows: usize,
    pub tracked_topics: usize,
}

/// Result of [`Monitor::run_single_check`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct SingleCheckReport {
    /// Per source: topics ingested, or the error
    pub sources: Vec<(String, Result<usize, String>)>,
    /// Per notification channel: health check outcome
    pub channels: Vec<(String, bool)>,
}

/// Owns the tracker and drives every polling loop
pub struct Monitor {
    config: Config,
    scorer: Scorer,
    tracker: Mutex<TrendTracker>,
    labels: RwLock<HashMap<TopicId, String>>,
    store: Arc<TrendStore>,
    notifier: Arc<NotificationManager>,
    sources: Vec<SourceSlot>,
    shutdown: watch::Sender<bool>,
    started_at: DateTime<Utc>,
}

impl Monitor {
    /// Build a monitor, warm-starting the tracker from `store` when enabled
    pub fn new(
        config: Config,
        store: Arc<TrendStore>,
        notifier: Arc<NotificationManager>,
    ) -> MonitorResult<Self> {
        let scorer = Scorer::new(config.scoring.clone())?;
        let now = Utc::now();
        let since = now - config.tracker.retention();

        let (tracker, labels) = if config.schedule.warm_start {
            let tracker = TrendTracker::warm_start(config.tracker.clone(), || {
                store.load_observations_since(since)
            })
            .map_err(|e| match e.downcast::<TrendError>() {
                Ok(trend) => MonitorError::Tracker(trend),
                Err(other) => MonitorError::storage("warm_start", format!("{other:#}")),
            })?;
            let labels = store
                .topic_labels(since)
                .map_err(|e| MonitorError::storage("load_labels", format!("{e:#}")))?;
            (tracker, labels)
        } else {
            (TrendTracker::new(config.tracker.clone())?, HashMap::new())
        };

        metrics::set_tracked_topics(tracker.len());
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            scorer,
            tracker: Mutex::new(tracker),
            labels: RwLock::new(labels),
            store,
            notifier,
            sources: Vec::new(),
            shutdown,
            started_at: now,
        })
    }

    /// Register a source polled every `interval_minutes`
    pub fn add_source(
        &mut self,
        source: Box<dyn TrendSource>,
        interval_minutes: u64,
    ) -> MonitorResult<()> {
        if interval_minutes == 0 {
            return Err(MonitorError::InvalidInterval {
                field: format!("{}_interval_minutes", source.name()),
                minutes: interval_minutes,
            });
        }

        info!(source = source.name(), interval_minutes, "Source registered");
        self.sources.push(SourceSlot {
            breaker: CircuitBreaker::with_defaults(source.name()),
            source,
            interval: Duration::from_secs(interval_minutes * 60),
            consecutive_failures: AtomicU32::new(0),
            last_success: RwLock::new(None),
            last_error: RwLock::new(None),
        });
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn store(&self) -> &TrendStore {
        &self.store
    }

    pub fn notifier(&self) -> &NotificationManager {
        &self.notifier
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source_statuses(&self) -> Vec<SourceStatus> {
        self.sources.iter().map(SourceSlot::status).collect()
    }

    /// Run `f` with the tracker locked
    pub async fn with_tracker<R>(&self, f: impl FnOnce(&TrendTracker) -> R) -> R {
        let tracker = self.tracker.lock().await;
        f(&tracker)
    }

    /// Display name for a topic, if one has been collected
    pub fn label(&self, topic_id: &TopicId) -> Option<String> {
        self.labels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic_id)
            .cloned()
    }

    /// Labels restricted to `ids`
    pub fn labels_for<'a>(&self, ids: impl IntoIterator<Item = &'a TopicId>) -> HashMap<TopicId, String> {
        let labels = self.labels.read().unwrap_or_else(|e| e.into_inner());
        ids.into_iter()
            .filter_map(|id| labels.get(id).map(|l| (id.clone(), l.clone())))
            .collect()
    }

    // ------------------------------------------------------------------
    // single steps
    // ------------------------------------------------------------------

    /// Score, track, persist and alert on one batch of collected topics
    pub async fn ingest(&self, source: &str, topics: Vec<CollectedTopic>) -> PollReport {
        let mut report = PollReport {
            source: source.to_string(),
            collected: topics.len(),
            ..Default::default()
        };

        let mut scores = Vec::with_capacity(topics.len());
        let mut records = Vec::with_capacity(topics.len());
        let tracked = {
            let mut tracker = self.tracker.lock().await;
            for topic in &topics {
                match tracker.ingest(&self.scorer, topic.snapshot.clone()) {
                    Ok((score, event)) => {
                        records.push(TrendRecord::from_collected(topic, score.value));
                        scores.push(score);
                        if let Some(event) = event {
                            report.events.push(event);
                        }
                    }
                    Err(e) => {
                        warn!(
                            source = source,
                            topic = %topic.snapshot.topic_id,
                            error = %e,
                            "Observation rejected"
                        );
                        report.rejected += 1;
                    }
                }
            }
            tracker.len()
        };
        report.scored = scores.len();

        {
            let mut labels = self.labels.write().unwrap_or_else(|e| e.into_inner());
            for topic in &topics {
                labels.insert(topic.snapshot.topic_id.clone(), topic.display_name.clone());
            }
        }

        if let Err(e) = self.persist(&records, &scores) {
            warn!(source = source, error = %e, "Failed to persist observations");
        }

        metrics::record_snapshots(source, report.scored);
        metrics::set_tracked_topics(tracked);
        for event in &report.events {
            metrics::record_classification(event.new_state.as_str());
            debug!(
                topic = %event.topic_id,
                from = event.old_state.as_str(),
                to = event.new_state.as_str(),
                score = event.score,
                "Topic state changed"
            );
        }

        if report.emerging() > 0 {
            let labels = self.labels_for(report.events.iter().map(|e| &e.topic_id));
            report.alerted = self
                .notifier
                .notify_emerging(&report.events, &labels, self.config.schedule.alert_top_n)
                .await
                .is_some();
        }

        info!(
            source = source,
            collected = report.collected,
            scored = report.scored,
            rejected = report.rejected,
            events = report.events.len(),
            emerging = report.emerging(),
            "Ingested topics"
        );
        report
    }

    fn persist(&self, records: &[TrendRecord], scores: &[Score]) -> MonitorResult<()> {
        self.store
            .save_trends_batch(records)
            .map_err(|e| MonitorError::storage("save_trends", format!("{e:#}")))?;
        self.store
            .record_observations(scores)
            .map_err(|e| MonitorError::storage("record_observations", format!("{e:#}")))?;
        Ok(())
    }

    async fn poll_slot(&self, slot: &SourceSlot) -> MonitorResult<PollReport> {
        let name = slot.source.name();
        let result = {
            let _timer = metrics::start_fetch_timer(name);
            fetch_guarded(slot.source.as_ref(), &slot.breaker).await
        };

        match result {
            Ok(topics) => {
                slot.consecutive_failures.store(0, Ordering::Relaxed);
                *slot.last_success.write().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
                *slot.last_error.write().unwrap_or_else(|e| e.into_inner()) = None;
                Ok(self.ingest(name, topics).await)
            }
            Err(SourceError::CircuitOpen(_)) => Err(MonitorError::source_failed(name, "circuit open")),
            Err(e) => {
                metrics::record_fetch_failure(name);
                let failures = slot.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                *slot.last_error.write().unwrap_or_else(|e| e.into_inner()) = Some(e.to_string());
                error!(source = name, failures, error = %e, "Source poll failed");

                if failures >= SOURCE_FAILURE_ALERT_THRESHOLD {
                    self.notifier
                        .notify_source_failure(name, failures, &e.to_string())
                        .await;
                }
                Err(MonitorError::source_failed(name, e.to_string()))
            }
        }
    }

    /// Poll every source once, concurrently
    ///
    /// Results come back in registration order.
    pub async fn poll_all(&self) -> Vec<(String, MonitorResult<PollReport>)> {
        let polls = self.sources.iter().map(|slot| async move {
            (slot.source.name().to_string(), self.poll_slot(slot).await)
        });
        futures::future::join_all(polls).await
    }

    /// Reclassify idle topics, garbage-collect and prune old rows
    pub async fn maintenance(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let (events, removed, tracked) = {
            let mut tracker = self.tracker.lock().await;
            let events = tracker.refresh(now);
            let removed = tracker.garbage_collect(now);
            (events, removed, tracker.len())
        };

        if !removed.is_empty() {
            let mut labels = self.labels.write().unwrap_or_else(|e| e.into_inner());
            for id in &removed {
                labels.remove(id);
            }
        }

        let pruned_rows = match self.store.prune_before(now - self.config.tracker.retention()) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to prune old rows");
                0
            }
        };

        self.notifier.cleanup_expired(now);

        for event in &events {
            metrics::record_classification(event.new_state.as_str());
        }
        metrics::set_tracked_topics(tracked);

        info!(
            events = events.len(),
            removed = removed.len(),
            pruned_rows,
            tracked_topics = tracked,
            "Maintenance pass complete"
        );

        MaintenanceReport {
            events,
            removed,
            pruned_rows,
            tracked_topics: tracked,
        }
    }

    /// Summary of the trailing window as of `as_of`
    pub async fn daily_summary(&self, as_of: DateTime<Utc>) -> DailySummary {
        self.tracker.lock().await.daily_summary(as_of)
    }

    /// Stored activity over the summary window ending at `as_of`
    pub fn activity_report(&self, as_of: DateTime<Utc>) -> anyhow::Result<ActivityReport> {
        let since = as_of - self.config.tracker.summary_window();
        self.store.activity_report(since)
    }

    /// Build and send the daily summary for today
    pub async fn send_daily_summary(&self) -> DailySummary {
        let now = Utc::now();
        let summary = self.daily_summary(now).await;
        let activity = self
            .activity_report(now)
            .map_err(|e| warn!(error = %e, "Failed to build activity report"))
            .ok();
        let labels = self.labels_for(summary.top_topics.iter().map(|e| &e.topic_id));
        let date = Local::now().date_naive();

        match self
            .notifier
            .notify_daily_summary(&summary, activity.as_ref(), &labels, date)
            .await
        {
            Some(alert) => info!(status = %alert.status, topics = summary.top_topics.len(), "Daily summary sent"),
            None => debug!(%date, "Daily summary already sent"),
        }
        summary
    }

    /// Poll every source once and check every notification channel
    pub async fn run_single_check(&self) -> SingleCheckReport {
        info!("Running single trend check...");
        let mut report = SingleCheckReport::default();

        for (name, result) in self.poll_all().await {
            let outcome = result
                .map(|r| r.scored)
                .map_err(|e| e.to_string());
            match &outcome {
                Ok(n) => info!(source = %name, topics = n, "Source check passed"),
                Err(e) => warn!(source = %name, error = %e, "Source check failed"),
            }
            report.sources.push((name, outcome));
        }

        report.channels = self.notifier.health_check().await;
        report
    }

    // ------------------------------------------------------------------
    // loops
    // ------------------------------------------------------------------

    /// Ask every loop to stop
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once [`Monitor::shutdown`] has been called
    pub fn shutdown_signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut stop = self.shutdown.subscribe();
        async move {
            let _ = stop.wait_for(|stopping| *stopping).await;
        }
    }

    async fn source_loop(self: Arc<Self>, index: usize) {
        let mut stop = self.shutdown.subscribe();
        let Some(slot) = self.sources.get(index) else {
            return;
        };
        let mut ticker = tokio::time::interval(slot.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_slot(slot).await {
                        debug!(error = %e, "Poll cycle ended with error");
                    }
                }
                _ = stop.changed() => break,
            }
        }
        info!(source = slot.source.name(), "Source loop stopped");
    }

    async fn maintenance_loop(self: Arc<Self>) {
        let mut stop = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.schedule.maintenance_interval_minutes.max(1) * 60);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.maintenance(Utc::now()).await;
                }
                _ = stop.changed() => break,
            }
        }
        info!("Maintenance loop stopped");
    }

    async fn daily_summary_loop(self: Arc<Self>, trigger: DailyTrigger) {
        let mut stop = self.shutdown.subscribe();

        loop {
            let wait = match trigger.duration_until_next() {
                Ok(wait) => wait,
                Err(e) => {
                    error!(error = %e, "Cannot schedule daily summary");
                    break;
                }
            };
            debug!(hour = trigger.hour(), next_in = %format_duration(wait), "Daily summary scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.send_daily_summary().await;
                }
                _ = stop.changed() => break,
            }
        }
        info!("Daily summary loop stopped");
    }

    /// Run every loop until [`Monitor::shutdown`] is called
    pub async fn run(self: Arc<Self>) -> MonitorResult<()> {
        if self.sources.is_empty() {
            return Err(MonitorError::trigger_config("sources", "no sources are configured"));
        }
        let trigger = DailyTrigger::new(self.config.schedule.daily_summary_hour)?;
        if self.config.schedule.maintenance_interval_minutes == 0 {
            return Err(MonitorError::InvalidInterval {
                field: "maintenance_interval_minutes".into(),
                minutes: 0,
            });
        }

        let tracked = self.with_tracker(|t| t.len()).await;
        info!(
            sources = self.sources.len(),
            tracked_topics = tracked,
            summary_hour = trigger.hour(),
            "Starting trend monitor"
        );

        let mut tasks = JoinSet::new();
        for index in 0..self.sources.len() {
            tasks.spawn(Arc::clone(&self).source_loop(index));
        }
        tasks.spawn(Arc::clone(&self).maintenance_loop());
        tasks.spawn(Arc::clone(&self).daily_summary_loop(trigger));

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Monitor task panicked");
                self.shutdown();
            }
        }

        info!("Trend monitor stopped");
        Ok(())
    }

    /// Run until Ctrl-C, then stop every loop gracefully
    pub async fn run_until_ctrl_c(self: Arc<Self>) -> MonitorResult<()> {
        let monitor = Arc::clone(&self);
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, stopping trend monitor...");
            }
            monitor.shutdown();
        });

        let result = self.run().await;
        signal.abort();
        result
    }
}
