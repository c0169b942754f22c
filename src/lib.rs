//! trendbot - Social media trend monitor
//!
//! Polls Twitter and Reddit, scores every topic, tracks its lifecycle and
//! alerts on emerging trends.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`] - Platforms, topic ids and metric snapshots
//! - [`analytics`] - Trend scorer and trend tracker
//! - [`sources`] - Twitter and Reddit clients behind the `TrendSource` trait
//! - [`storage`] - SQLite persistence for trends and scored observations
//! - [`notifications`] - Alerts, dedup and Telegram / webhook channels
//! - [`scheduler`] - The monitor and its polling loops
//! - [`server`] - HTTP status and metrics endpoints
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Retry, circuit breaker and text helpers
//!
//! # Example
//!
//! ```no_run
//! use trendbot::analytics::{Scorer, TrackerConfig, TrendTracker};
//! use trendbot::models::{MetricSnapshot, Platform};
//!
//! fn main() -> anyhow::Result<()> {
//!     let scorer = Scorer::default();
//!     let mut tracker = TrendTracker::new(TrackerConfig::default())?;
//!
//!     let snapshot = MetricSnapshot::new(Platform::Twitter, "#rust", chrono::Utc::now())
//!         .with_volume(1200)
//!         .with_engagement(5400, 800);
//!     let (score, event) = tracker.ingest(&scorer, snapshot)?;
//!     println!("score {} event {:?}", score.value, event);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod scheduler;
pub mod server;
pub mod sources;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analytics::{ClassificationEvent, Score, Scorer, TopicState, TrendTracker};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, TrendbotErrorTrait};
    pub use crate::models::{CollectedTopic, MetricSnapshot, Platform, TopicId};
    pub use crate::notifications::NotificationManager;
    pub use crate::scheduler::Monitor;
    pub use crate::sources::TrendSource;
    pub use crate::storage::TrendStore;
}

// Direct re-exports for convenience
pub use models::{CollectedTopic, MetricSnapshot, Platform, TopicId};
