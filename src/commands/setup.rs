//! Wiring shared by the subcommands

use anyhow::{Context, Result};
use std::sync::Arc;

use trendbot::config::Config;
use trendbot::notifications::{NotificationManager, TelegramChannel, WebhookChannel};
use trendbot::scheduler::Monitor;
use trendbot::sources::{RedditSource, SourceError, TrendSource};
use trendbot::storage::TrendStore;

/// Open the SQLite store named by the config
pub fn open_store(config: &Config) -> Result<Arc<TrendStore>> {
    let store = TrendStore::open(&config.database.path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database.path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Notifier with every configured channel registered
pub fn build_notifier(config: &Config) -> Result<NotificationManager> {
    let mut notifier =
        NotificationManager::new().with_dedup_window(config.schedule.dedup_window_minutes);

    if config.telegram.is_configured() {
        let channel =
            TelegramChannel::new(&config.telegram).context("Failed to create Telegram channel")?;
        notifier.add_channel(Box::new(channel));
    } else {
        tracing::warn!("Telegram not configured, alerts will not be sent there");
    }

    if config.webhook.url.is_some() {
        let channel =
            WebhookChannel::new(&config.webhook).context("Failed to create webhook channel")?;
        notifier.add_channel(Box::new(channel));
    }

    Ok(notifier)
}

/// Sources with credentials, paired with their poll interval in minutes
pub fn build_sources(config: &Config) -> Result<Vec<(Box<dyn TrendSource>, u64)>> {
    let mut sources: Vec<(Box<dyn TrendSource>, u64)> = Vec::new();

    match trendbot::sources::TwitterSource::new(&config.twitter) {
        Ok(source) => sources.push((Box::new(source), config.schedule.twitter_interval_minutes)),
        Err(SourceError::NotConfigured(name)) => {
            tracing::warn!(source = name, "Source not configured, skipping");
        }
        Err(e) => return Err(e).context("Failed to create Twitter source"),
    }

    match RedditSource::new(&config.reddit) {
        Ok(source) => sources.push((Box::new(source), config.schedule.reddit_interval_minutes)),
        Err(SourceError::NotConfigured(name)) => {
            tracing::warn!(source = name, "Source not configured, skipping");
        }
        Err(e) => return Err(e).context("Failed to create Reddit source"),
    }

    Ok(sources)
}

/// Monitor over the configured store, notifier and sources
pub fn build_monitor(config: &Config) -> Result<Monitor> {
    let store = open_store(config)?;
    let notifier = Arc::new(build_notifier(config)?);

    let mut monitor =
        Monitor::new(config.clone(), store, notifier).context("Failed to create monitor")?;
    for (source, interval) in build_sources(config)? {
        monitor.add_source(source, interval)?;
    }
    Ok(monitor)
}
