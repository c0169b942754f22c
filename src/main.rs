use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendbot::config::Config;
use trendbot::error::{Error, Result, TrendbotErrorTrait};

mod commands;

#[derive(Parser)]
#[command(
    name = "trendbot",
    version,
    about = "Social media trend monitor with emerging-topic alerts",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until Ctrl-C
    Run {
        /// Serve the status API even if it is disabled in the config
        #[arg(long, default_value = "false")]
        serve: bool,
    },

    /// Poll every source once and check notification channels
    Check,

    /// Show the summary of the last 24 hours from stored observations
    Summary {
        /// Also send it through the notification channels
        #[arg(long, default_value = "false")]
        send: bool,
    },

    /// List the highest-scoring stored topics
    Top {
        /// Restrict to one platform (twitter, reddit)
        #[arg(short, long)]
        platform: Option<String>,

        /// Look-back window in hours
        #[arg(long, default_value = "24")]
        hours: i64,

        /// Number of topics to list
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show database row counts
    Stats,

    /// Recompute stored scores with the configured weights
    Rescore,

    /// Send a test message through every notification channel
    TestNotify,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let category = err.category();
            tracing::error!(
                category = category.as_str(),
                recoverable = err.is_recoverable(),
                error = %err,
                "TrendBot failed"
            );
            eprintln!("Error: {err}");
            ExitCode::from(category.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config =
        Config::load(cli.config.as_deref()).map_err(|e| Error::config(format!("{e:#}")))?;

    // Initialize tracing/logging
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&format, &config.logging.level, cli.verbose);

    tracing::info!("TrendBot starting");

    match cli.command {
        Commands::Run { serve } => {
            tracing::info!(serve = %serve, "Starting run command");
            commands::run(config, serve).await?;
        }

        Commands::Check => {
            tracing::info!("Starting check command");
            commands::check(config).await?;
        }

        Commands::Summary { send } => {
            tracing::info!(send = %send, "Starting summary command");
            commands::summary(config, send).await?;
        }

        Commands::Top {
            platform,
            hours,
            limit,
        } => {
            tracing::info!(
                platform = ?platform,
                hours = %hours,
                limit = %limit,
                "Starting top command"
            );
            commands::top(&config, platform, hours, limit)?;
        }

        Commands::Stats => {
            commands::stats(&config)?;
        }

        Commands::Rescore => {
            tracing::info!("Starting rescore command");
            commands::rescore(&config)?;
        }

        Commands::TestNotify => {
            tracing::info!("Starting test-notify command");
            commands::test_notify(&config).await?;
        }
    }

    tracing::info!("TrendBot completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("trendbot=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("trendbot={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
