use anyhow::{Context, Result};
use std::sync::Arc;

use trendbot::config::Config;
use trendbot::server::StatusServer;

use super::setup::build_monitor;

/// Run the monitor until Ctrl-C
pub async fn run(config: Config, serve: bool) -> Result<()> {
    if let Err(e) = trendbot::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let monitor = Arc::new(build_monitor(&config)?);
    if monitor.source_count() == 0 {
        anyhow::bail!(
            "No sources configured. Set TWITTER_BEARER_TOKEN and/or REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET"
        );
    }

    println!("Starting TrendBot");
    println!("=================");
    for status in monitor.source_statuses() {
        println!("  {}: every {} min", status.name, status.interval_minutes);
    }
    println!(
        "  Daily summary: {:02}:00 local",
        config.schedule.daily_summary_hour
    );
    println!("  Notification channels: {}", monitor.notifier().channel_count());

    let server = if serve || config.server.enabled {
        let server = StatusServer::new(&config.server, Arc::clone(&monitor))
            .context("Failed to create status server")?;
        println!("  Status server: http://{}", server.bind_address());
        let shutdown = monitor.shutdown_signal();
        Some(tokio::spawn(async move {
            server.start_with_shutdown(shutdown).await
        }))
    } else {
        None
    };

    println!("Press Ctrl+C to stop.\n");
    let result = Arc::clone(&monitor).run_until_ctrl_c().await;
    monitor.shutdown();

    if let Some(handle) = server {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Status server failed"),
            Err(e) => tracing::error!(error = %e, "Status server task panicked"),
        }
    }

    result.context("Monitor stopped with an error")?;
    println!("TrendBot stopped.");
    Ok(())
}
