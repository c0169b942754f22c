use anyhow::Result;

use trendbot::config::Config;

use super::setup::build_monitor;

/// Poll every source once and check the notification channels
pub async fn check(config: Config) -> Result<()> {
    let monitor = build_monitor(&config)?;

    println!("Running single trend check");
    println!("==========================");

    if monitor.source_count() == 0 {
        println!("No sources configured.");
    }

    let report = monitor.run_single_check().await;

    println!("\nSources:");
    for (name, outcome) in &report.sources {
        match outcome {
            Ok(topics) => println!("  [ok]     {name}: {topics} topics"),
            Err(e) => println!("  [failed] {name}: {e}"),
        }
    }

    println!("\nNotification channels:");
    if report.channels.is_empty() {
        println!("  (none configured)");
    }
    for (name, healthy) in &report.channels {
        println!(
            "  [{}] {name}",
            if *healthy { "ok" } else { "failed" }
        );
    }

    let stats = monitor.store().stats()?;
    println!(
        "\nStore: {} trend rows, {} observations, {} topics",
        stats.trends, stats.observations, stats.topics
    );

    let all_failed =
        !report.sources.is_empty() && report.sources.iter().all(|(_, outcome)| outcome.is_err());
    if all_failed {
        anyhow::bail!("Every source failed");
    }
    Ok(())
}
