//! Prometheus metrics for the trend monitor
//!
//! This module provides metrics tracking for:
//! - Sources: snapshots collected, fetch failures, poll duration
//! - Tracker: classification events by state, tracked topics
//! - Notifications: alerts sent per channel and outcome
//! - HTTP: API requests served
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct TrendbotMetrics {
    snapshots_collected: CounterVec,
    fetch_failures: CounterVec,
    fetch_duration: HistogramVec,
    classification_events: CounterVec,
    tracked_topics: Gauge,
    alerts_sent: CounterVec,
    api_requests: CounterVec,
}

/// `None` once registration has failed
static METRICS: OnceLock<Option<TrendbotMetrics>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

fn register() -> Result<TrendbotMetrics, prometheus::Error> {
    Ok(TrendbotMetrics {
        snapshots_collected: register_counter_vec!(
            "trendbot_snapshots_collected_total",
            "Metric snapshots collected per platform",
            &["platform"]
        )?,
        fetch_failures: register_counter_vec!(
            "trendbot_fetch_failures_total",
            "Failed source polls per platform",
            &["platform"]
        )?,
        fetch_duration: register_histogram_vec!(
            "trendbot_fetch_duration_seconds",
            "Time spent polling a source in seconds",
            &["platform"],
            vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
        )?,
        classification_events: register_counter_vec!(
            "trendbot_classification_events_total",
            "Topic state transitions by new state",
            &["state"]
        )?,
        tracked_topics: register_gauge!(
            "trendbot_tracked_topics",
            "Number of topics currently held by the tracker"
        )?,
        alerts_sent: register_counter_vec!(
            "trendbot_alerts_sent_total",
            "Alert deliveries by channel, condition and outcome",
            &["channel", "condition", "outcome"]
        )?,
        api_requests: register_counter_vec!(
            "trendbot_api_requests_total",
            "HTTP API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
    })
}

/// Initialize all Prometheus metrics
///
/// Idempotent. If metric registration fails, the error is logged and
/// subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = trendbot::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
///     // Application can continue without metrics
/// }
/// ```
pub fn init_metrics() -> Result<(), String> {
    let metrics = METRICS.get_or_init(|| match register() {
        Ok(m) => {
            tracing::info!("Prometheus metrics initialized successfully");
            Some(m)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus metrics registration failed");
            None
        }
    });

    match metrics {
        Some(_) => Ok(()),
        None => Err("metrics registration failed".to_string()),
    }
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    matches!(METRICS.get(), Some(Some(_)))
}

fn metrics() -> Option<&'static TrendbotMetrics> {
    METRICS.get().and_then(Option::as_ref)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a successful poll
pub fn record_snapshots(platform: &str, count: usize) {
    if let Some(m) = metrics() {
        m.snapshots_collected
            .with_label_values(&[platform])
            .inc_by(count as f64);
    }
}

/// Record a failed poll
pub fn record_fetch_failure(platform: &str) {
    if let Some(m) = metrics() {
        m.fetch_failures.with_label_values(&[platform]).inc();
    }
}

/// Record a classification event
pub fn record_classification(state: &str) {
    if let Some(m) = metrics() {
        m.classification_events.with_label_values(&[state]).inc();
    }
}

/// Update the tracked topics gauge
pub fn set_tracked_topics(count: usize) {
    if let Some(m) = metrics() {
        m.tracked_topics.set(count as f64);
    }
}

/// Record one alert delivery attempt
pub fn record_alert(channel: &str, condition: &str, outcome: &str) {
    if let Some(m) = metrics() {
        m.alerts_sent
            .with_label_values(&[channel, condition, outcome])
            .inc();
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16) {
    if let Some(m) = metrics() {
        let status_str = status.to_string();
        m.api_requests
            .with_label_values(&[endpoint, status_str.as_str()])
            .inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a poll timer for `platform`
pub fn start_fetch_timer(platform: &str) -> MetricsTimer {
    match metrics() {
        Some(m) => MetricsTimer::new(m.fetch_duration.with_label_values(&[platform]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
