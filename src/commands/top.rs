use anyhow::Result;
use chrono::{Duration, Utc};

use trendbot::config::Config;
use trendbot::models::Platform;

use super::setup::open_store;

/// Print the highest-scoring stored topics
pub fn top(config: &Config, platform: Option<String>, hours: i64, limit: usize) -> Result<()> {
    let platform = match platform.as_deref() {
        None => None,
        Some(raw) => Some(
            Platform::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("Unknown platform: {raw}. Valid: twitter, reddit"))?,
        ),
    };
    if hours <= 0 {
        anyhow::bail!("--hours must be positive");
    }

    let store = open_store(config)?;
    let since = Utc::now() - Duration::hours(hours);
    let trends = store.top_trends(platform, since, limit)?;

    println!(
        "Top trends, last {hours}h ({})",
        platform.map_or("all platforms", |p| p.label())
    );
    println!("================================");

    if trends.is_empty() {
        println!("No trends stored in this window.");
        return Ok(());
    }

    for (i, trend) in trends.iter().enumerate() {
        println!(
            "{:>2}. [{}] {} - max score {:.1}, {} mentions",
            i + 1,
            trend.platform.label(),
            trend.topic,
            trend.max_score,
            trend.mentions
        );
    }
    Ok(())
}

/// Print row counts of the store
pub fn stats(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    println!("Database: {}", config.database.path.display());
    println!("  Trend rows:    {}", stats.trends);
    println!("  Observations:  {}", stats.observations);
    println!("  Topics:        {}", stats.topics);
    Ok(())
}
