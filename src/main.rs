use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ics2gcal_core::config::{DEFAULT_TIME_ZONE, SyncConfig};
use ics2gcal_core::source::parse_document;
use ics2gcal_core::sync::run_sync;
use ics2gcal_core::window::DEFAULT_WINDOW_DAYS;

mod auth;
mod google;

/// One-way sync of an iCalendar (.ics) file into a Google Calendar.
#[derive(Parser, Debug)]
#[command(name = "ics2gcal", version)]
struct Args {
    /// Path to the .ics file to reconcile
    file: PathBuf,

    /// Display name of the Google Calendar to sync into
    #[arg(short = 'g', long = "calendar")]
    calendar: String,

    /// Comma-separated category names that are never created remotely
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Output time zone for corrected date-times
    #[arg(long, default_value = DEFAULT_TIME_ZONE)]
    timezone: String,

    /// Days either side of now to reconcile
    #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
    days: i64,

    /// Verbose log output
    #[arg(short = 'V', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    // A document that does not parse aborts before any remote call.
    let document = parse_document(&content)?;

    let config = SyncConfig {
        calendar_name: args.calendar,
        exclude_categories: args.exclude.into_iter().collect(),
        window_days: args.days,
        time_zone: args.timezone,
    };

    let remote = google::GoogleRemote::from_stored_tokens(&config.time_zone).await?;
    let report = run_sync(&remote, &config, &document).await?;

    tracing::info!(
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        instances_patched = report.instances_patched,
        failures = report.failures.len(),
        "run complete"
    );
    // Per-item failures were already logged; the run itself completed.
    Ok(())
}
