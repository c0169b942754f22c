//! Trend scoring and emerging-topic detection
//!
//! - [`scorer`] turns a metric snapshot into a comparable score
//! - [`tracker`] keeps per-topic score history and classifies lifecycle state

pub mod error;
pub mod scorer;
pub mod state;
pub mod tracker;

pub use error::{TrendError, TrendResult};
pub use scorer::{Score, ScoreBreakdown, Scorer, ScoringConfig, NEUTRAL_VELOCITY};
pub use state::{ClassificationEvent, TopicState};
pub use tracker::{
    DailySummary, HistoryEntry, SummaryEntry, TopicHistory, TrackerConfig, TrendTracker,
};
