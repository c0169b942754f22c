use anyhow::{Context, Result};

use trendbot::analytics::Scorer;
use trendbot::config::Config;

use super::setup::open_store;

/// Recompute stored scores with the configured weights
pub fn rescore(config: &Config) -> Result<()> {
    let scorer = Scorer::new(config.scoring.clone()).context("Invalid scoring configuration")?;
    let store = open_store(config)?;

    println!("Rescoring stored observations");
    println!(
        "  Weights: engagement {:.2}, velocity {:.2}, recency {:.2}",
        config.scoring.engagement_weight,
        config.scoring.velocity_weight,
        config.scoring.recency_weight
    );

    let report = store.rescore(&scorer).context("Rescore failed")?;

    println!("  Rescored: {}", report.rescored);
    if report.rejected > 0 {
        println!("  Rejected: {} (previous score kept)", report.rejected);
    }
    Ok(())
}
