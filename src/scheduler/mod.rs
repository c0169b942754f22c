//! Trend monitoring loops
//!
//! The monitor polls every configured source on its own interval, feeds the
//! collected topics through the scorer and tracker, and hands state changes
//! to the notifier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ Twitter loop │   │ Reddit loop  │        every 30 / 45 minutes
//! └──────┬───────┘   └──────┬───────┘
//!        │  fetch_guarded   │
//!        └────────┬─────────┘
//!          ┌──────▼──────┐
//!          │   Scorer    │
//!          │   Tracker   │ ◄──── maintenance loop (refresh, GC, prune)
//!          └──────┬──────┘
//!        ┌────────┼─────────┐
//!        ▼        ▼         ▼
//!    SQLite    Notifier   Metrics      ◄──── daily trigger (summary)
//! ```
//!
//! # Modules
//!
//! - [`monitor`] - The [`Monitor`] and its polling loops
//! - [`trigger`] - Daily wall-clock trigger for the summary
//! - [`error`] - Monitor errors
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use trendbot::scheduler::Monitor;
//!
//! let mut monitor = Monitor::new(config, store, notifier)?;
//! monitor.add_source(Box::new(twitter), 30)?;
//!
//! let monitor = Arc::new(monitor);
//! monitor.run_until_ctrl_c().await?;
//! ```

pub mod error;
pub mod monitor;
pub mod trigger;

pub use error::{MonitorError, MonitorResult};
pub use monitor::{
    MaintenanceReport, Monitor, PollReport, SingleCheckReport, SourceStatus,
    SOURCE_FAILURE_ALERT_THRESHOLD,
};
pub use trigger::DailyTrigger;
