use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use trendbot::analytics::TopicState;
use trendbot::config::Config;
use trendbot::models::TopicId;
use trendbot::scheduler::Monitor;
use trendbot::storage::ActivityReport;
use trendbot::utils::truncate_text;

use super::setup::{build_notifier, open_store};

const LABEL_CHARS: usize = 60;

/// Unescaped display label for terminal output
fn plain_label(topic_id: &TopicId, labels: &HashMap<TopicId, String>) -> String {
    let raw = labels
        .get(topic_id)
        .map(String::as_str)
        .unwrap_or_else(|| topic_id.name());
    truncate_text(raw, LABEL_CHARS)
}

fn print_activity(activity: &ActivityReport) {
    println!("\nStored activity");
    println!("--------------------------------");
    if activity.is_empty() {
        println!("No trend records in this window.");
        return;
    }

    println!("Records:       {}", activity.total_records);
    println!("Unique topics: {}", activity.unique_topics);
    println!("Average score: {:.2}", activity.avg_score);
    println!("Highest score: {:.2}", activity.max_score);

    for platform in &activity.platforms {
        println!("\n{}:", platform.platform.as_str().to_uppercase());
        println!("  Records:   {} ({} topics)", platform.records, platform.unique_topics);
        println!("  Avg score: {:.2}", platform.avg_score);
        println!("  Top score: {:.2}", platform.max_score);
        if let Some(top) = &platform.top_trend {
            println!("  Top trend: {}", truncate_text(top, LABEL_CHARS));
        }
        if let Some(subreddit) = &platform.top_subreddit {
            println!("  Most active: r/{subreddit}");
        }
    }

    println!("\nTop records:");
    for (i, record) in activity.top_records.iter().enumerate() {
        println!(
            "{:>2}. {} ({}, {:.1} at {})",
            i + 1,
            truncate_text(&record.topic, LABEL_CHARS),
            record.platform,
            record.score,
            record.timestamp.format("%H:%M")
        );
    }
}

/// Print the summary of the trailing window rebuilt from the store
pub async fn summary(mut config: Config, send: bool) -> Result<()> {
    config.schedule.warm_start = true;
    let store = open_store(&config)?;
    let notifier = Arc::new(build_notifier(&config)?);
    let monitor = Monitor::new(config, store, notifier).context("Failed to rebuild tracker")?;

    let now = Utc::now();
    let summary = monitor.daily_summary(now).await;
    let labels = monitor.labels_for(summary.top_topics.iter().map(|e| &e.topic_id));

    println!(
        "Trend summary {} - {}",
        summary.window_start.format("%Y-%m-%d %H:%M"),
        summary.as_of.format("%Y-%m-%d %H:%M UTC")
    );
    println!("================================");
    println!("Tracked topics: {}", summary.tracked_topics);
    for state in TopicState::all() {
        println!("  {:<12} {}", state.as_str(), summary.count(state));
    }

    if summary.top_topics.is_empty() {
        println!("\nNo topics emerged in this window.");
    } else {
        println!("\nTop emerging topics:");
        for (i, entry) in summary.top_topics.iter().enumerate() {
            println!(
                "{:>2}. {} (peak {:.1}, latest {:.1}, emerged {}x, {})",
                i + 1,
                plain_label(&entry.topic_id, &labels),
                entry.peak_score,
                entry.latest_score,
                entry.emergences,
                entry.state
            );
        }
    }

    let activity = monitor
        .store()
        .activity_report(summary.window_start)
        .context("Failed to read stored activity")?;
    print_activity(&activity);

    if send {
        if monitor.notifier().channel_count() == 0 {
            anyhow::bail!("No notification channels configured");
        }
        monitor.send_daily_summary().await;
        println!("\nSummary sent.");
    }
    Ok(())
}
