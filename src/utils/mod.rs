//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod circuit;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Strip control characters and collapse whitespace in upstream text
///
/// Used for titles and trend names before they reach the store or a
/// notification message.
pub fn clean_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    normalize_whitespace(&stripped)
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Format a duration as a short human-readable string (`1h 5m`, `45s`)
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, m) => format!("{m}m {seconds}s"),
        (h, m) => format!("{h}h {m}m"),
    }
}
