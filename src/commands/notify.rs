use anyhow::Result;

use trendbot::config::Config;
use trendbot::notifications::was_delivered;

use super::setup::build_notifier;

/// Check every channel and send a test message through them
pub async fn test_notify(config: &Config) -> Result<()> {
    let notifier = build_notifier(config)?;
    if notifier.channel_count() == 0 {
        anyhow::bail!(
            "No notification channels configured. Set TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID or WEBHOOK_URL"
        );
    }

    println!("Checking notification channels");
    for (name, healthy) in notifier.health_check().await {
        println!(
            "  [{}] {name}",
            if healthy { "ok" } else { "failed" }
        );
    }

    let alert = notifier.send_test().await;
    if was_delivered(&alert) {
        println!("\nTest message sent.");
        Ok(())
    } else {
        anyhow::bail!("Test message was not delivered by any channel")
    }
}
