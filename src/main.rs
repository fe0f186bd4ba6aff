use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::OverrideParams;

#[derive(Parser)]
#[command(
    name = "rota",
    version,
    about = "On-call auto-scheduling with overrides and swaps",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (pretty, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file; the environment is used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scheduling cycles periodically
    Run {
        /// Run a single cycle and exit
        #[arg(long, default_value = "false")]
        once: bool,
    },

    /// Rebuild a schedule's events from an instant onwards
    Populate {
        /// Schedule id
        #[arg(short, long)]
        schedule: i64,

        /// Start instant (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
    },

    /// Show what populate would create, without persisting
    Preview {
        /// Schedule id
        #[arg(short, long)]
        schedule: i64,

        /// Start instant (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End of the preview window (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },

    /// Substitute a user into a run of consecutive events
    Override {
        /// Event ids
        #[arg(short, long, required = true, value_delimiter = ',')]
        events: Vec<i64>,

        /// Start of the substitution (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End of the substitution (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        /// Substitute user id
        #[arg(short, long)]
        user: i64,

        /// Ignore the edit grace period
        #[arg(long, default_value = "false")]
        privileged: bool,
    },

    /// Swap the assignees of two events or linked shifts
    Swap {
        /// First target (event:<id> or link:<id>)
        a: String,

        /// Second target (event:<id> or link:<id>)
        b: String,

        /// Ignore the edit grace period
        #[arg(long, default_value = "false")]
        privileged: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize tracing/logging
    let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(format, &config.logging.level, cli.verbose)?;

    tracing::info!(
        database = %config.database.sqlite_path.display(),
        "rota starting"
    );

    match cli.command {
        Commands::Run { once } => {
            tracing::info!(once = %once, "Starting run command");
            commands::run(config, once).await?;
        }

        Commands::Populate { schedule, start } => {
            tracing::info!(schedule_id = schedule, start = %start, "Starting populate command");
            commands::populate(config, schedule, start).await?;
        }

        Commands::Preview {
            schedule,
            start,
            end,
        } => {
            tracing::info!(
                schedule_id = schedule,
                start = %start,
                end = %end,
                "Starting preview command"
            );
            commands::preview(config, schedule, start, end).await?;
        }

        Commands::Override {
            events,
            start,
            end,
            user,
            privileged,
        } => {
            tracing::info!(
                events = ?events,
                user_id = user,
                privileged = %privileged,
                "Starting override command"
            );
            commands::override_events(
                config,
                OverrideParams {
                    event_ids: events,
                    start,
                    end,
                    user_id: user,
                    privileged,
                },
            )
            .await?;
        }

        Commands::Swap { a, b, privileged } => {
            tracing::info!(a = %a, b = %b, privileged = %privileged, "Starting swap command");
            commands::swap(config, a, b, privileged).await?;
        }
    }

    tracing::info!("rota completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("rota=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("rota={level},warn")))
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

    Ok(())
}
