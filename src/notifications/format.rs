//! Message bodies for alerts
//!
//! Messages use Telegram's legacy Markdown; anything taken from upstream
//! (trend names, post titles, error text) goes through [`escape_markdown`].

use chrono::{DateTime, Local, Utc};
use std::collections::HashMap;
use std::fmt::Write;

use crate::analytics::{ClassificationEvent, DailySummary, TopicState};
use crate::models::{Platform, TopicId};
use crate::storage::ActivityReport;
use crate::utils::truncate_text;

/// Longest topic label shown in a message
const MAX_LABEL_CHARS: usize = 60;

/// Escape the characters legacy Markdown treats as markup
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Display label for a topic, falling back to the normalized name
pub fn topic_label(topic_id: &TopicId, labels: &HashMap<TopicId, String>) -> String {
    let raw = labels
        .get(topic_id)
        .map(String::as_str)
        .unwrap_or_else(|| topic_id.name());
    escape_markdown(&truncate_text(raw, MAX_LABEL_CHARS))
}

fn platform_label(topic_id: &TopicId) -> &'static str {
    topic_id.platform().map_or("unknown", |p| p.label())
}

/// Emerging-trends alert listing the given events in order
pub fn emerging_alert(
    events: &[ClassificationEvent],
    labels: &HashMap<TopicId, String>,
    detected_at: DateTime<Utc>,
) -> String {
    let mut message = String::from("🚀 *Emerging Trends Alert*\n\n");

    for (i, event) in events.iter().enumerate() {
        let _ = writeln!(
            message,
            "{}. *{}* ({})",
            i + 1,
            topic_label(&event.topic_id, labels),
            platform_label(&event.topic_id)
        );
        let _ = writeln!(
            message,
            "   Score: {:.1} | Velocity: {:+.2} pts/min\n",
            event.score, event.velocity
        );
    }

    let _ = write!(
        message,
        "_Detected at {}_",
        detected_at.with_timezone(&Local).format("%H:%M")
    );
    message
}

/// Daily digest: per-platform activity, per-state counts and the top
/// emerging topics
///
/// `activity` is `None` when the store could not be read; the tracker part
/// is still sent.
pub fn daily_summary(
    summary: &DailySummary,
    activity: Option<&ActivityReport>,
    labels: &HashMap<TopicId, String>,
) -> String {
    let mut message = String::from("📈 *Daily Trend Summary*\n\n");

    if let Some(activity) = activity {
        write_activity(&mut message, activity);
    }

    let _ = writeln!(message, "📊 Tracked topics: {}", summary.tracked_topics);
    for state in TopicState::all() {
        let count = summary.count(state);
        if count > 0 {
            let _ = writeln!(message, "   {} {}: {}", state.emoji(), state, count);
        }
    }

    if summary.top_topics.is_empty() {
        message.push_str("\nNo emerging topics in the last 24 hours.\n");
    } else {
        message.push_str("\n🔥 *Top emerging topics*\n");
        for (i, entry) in summary.top_topics.iter().enumerate() {
            let times = if entry.emergences == 1 {
                String::new()
            } else {
                format!(", emerged {}x", entry.emergences)
            };
            let _ = writeln!(
                message,
                "{}. `{}` ({}) peak {:.1}{}",
                i + 1,
                topic_label(&entry.topic_id, labels),
                platform_label(&entry.topic_id),
                entry.peak_score,
                times
            );
        }
    }

    message.push_str("\n_Powered by TrendBot_ 🤖");
    message
}

fn write_activity(message: &mut String, activity: &ActivityReport) {
    for platform in &activity.platforms {
        match platform.platform {
            Platform::Twitter => {
                let _ = writeln!(message, "📱 *Twitter*: {} trends tracked", platform.records);
                if let Some(top) = &platform.top_trend {
                    let _ = writeln!(
                        message,
                        "   Top: `{}`",
                        escape_markdown(&truncate_text(top, MAX_LABEL_CHARS))
                    );
                }
            }
            Platform::Reddit => {
                let _ = writeln!(message, "🔴 *Reddit*: {} hot topics", platform.records);
                if let Some(subreddit) = &platform.top_subreddit {
                    let _ = writeln!(message, "   Most active: r/{}", escape_markdown(subreddit));
                }
            }
        }
    }
    let _ = writeln!(message, "💾 Total records: {}\n", activity.total_records);
}

/// Source failure warning
pub fn source_failure(source: &str, consecutive_failures: u32, error: &str) -> String {
    format!(
        "⚠️ *Source failure*\n\n*{}* failed {} times in a row.\nLast error: {}",
        escape_markdown(source),
        consecutive_failures,
        escape_markdown(&truncate_text(error, 200))
    )
}

/// Connectivity test message
pub fn test_message() -> String {
    String::from("🤖 TrendBot test message - connection successful!")
}
