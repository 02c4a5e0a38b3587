//! `slot` CLI — find free calendar slots and place pasted tasks into them.
//!
//! ## Usage
//!
//! ```sh
//! # Show the next 5 free 30-minute slots around a busy calendar
//! slot slots --busy busy.json
//!
//! # Schedule pasted tasks (one per line) and write the created events
//! pbpaste | slot schedule --busy busy.json -o events.json
//!
//! # Custom working window, time zone and event length
//! slot schedule -i tasks.txt --start 08:30 --end 12:00 --timezone Europe/Paris --duration 45
//!
//! # Load settings from a JSON document; flags still override it
//! slot --config settings.json schedule -i tasks.txt
//! ```

mod files;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use slot_engine::{
    parse_task_list, resolve, BatchReport, BatchScheduler, FixedClock, Progress, RetryingSink,
    ScheduleOptions, Settings, Slot, TimeOfDay,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::files::{CollectingSink, FileBusySource};

#[derive(Parser)]
#[command(
    name = "slot",
    version,
    about = "Place a list of tasks into free calendar slots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings document (JSON); individual flags override its fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log resolver and scheduler decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the next free slots as JSON
    Slots {
        /// Busy intervals file (JSON array of {start, end})
        #[arg(long)]
        busy: Option<PathBuf>,
        /// Number of slots to print
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        overrides: SettingsOverrides,
    },
    /// Schedule tasks (one per line) into free slots
    Schedule {
        /// Task list file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file for created events (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Busy intervals file (JSON array of {start, end})
        #[arg(long)]
        busy: Option<PathBuf>,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        overrides: SettingsOverrides,
    },
}

#[derive(Args)]
struct WindowArgs {
    /// Earliest instant to place anything at (RFC 3339, default: now)
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Pretend the current time is this instant (RFC 3339)
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct SettingsOverrides {
    /// Daily window start, HH:MM
    #[arg(long)]
    start: Option<TimeOfDay>,
    /// Daily window end, HH:MM
    #[arg(long)]
    end: Option<TimeOfDay>,
    /// Event length in minutes
    #[arg(long)]
    duration: Option<u32>,
    /// Look-ahead limit in days
    #[arg(long)]
    horizon: Option<u32>,
    /// IANA time zone of the daily window
    #[arg(long)]
    timezone: Option<String>,
    /// Calendar to read from and write to
    #[arg(long)]
    calendar: Option<String>,
    /// Concurrent event writes
    #[arg(long)]
    concurrency: Option<usize>,
}

impl SettingsOverrides {
    fn apply(self, settings: &mut Settings) {
        if let Some(start) = self.start {
            settings.start_time = start;
        }
        if let Some(end) = self.end {
            settings.end_time = end;
        }
        if let Some(duration) = self.duration {
            settings.duration_minutes = duration;
        }
        if let Some(horizon) = self.horizon {
            settings.horizon_days = horizon;
        }
        if let Some(timezone) = self.timezone {
            settings.timezone = timezone;
        }
        if let Some(calendar) = self.calendar {
            settings.calendar_id = calendar;
        }
        if let Some(concurrency) = self.concurrency {
            settings.max_in_flight = concurrency;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Slots {
            busy,
            count,
            window,
            overrides,
        } => {
            let settings = load_settings(cli.config.as_deref(), overrides)?;
            let source = load_busy(busy.as_deref())?;
            let now = window.now.unwrap_or_else(Utc::now);
            let slots: Vec<Slot> = resolve(
                window.from.unwrap_or(now),
                now,
                &settings.working_hours()?,
                &settings.search(),
                source.intervals(),
            )?
            .take(count)
            .collect();
            println!("{}", serde_json::to_string_pretty(&slots)?);
        }
        Commands::Schedule {
            input,
            output,
            busy,
            window,
            overrides,
        } => {
            let settings = load_settings(cli.config.as_deref(), overrides)?;
            let source = load_busy(busy.as_deref())?;
            let tasks = parse_task_list(&read_input(input.as_deref())?);
            let now = window.now;

            let mut scheduler = BatchScheduler::new().with_max_in_flight(settings.max_in_flight);
            if let Some(now) = now {
                scheduler = scheduler.with_clock(FixedClock(now));
            }
            if let Some(description) = &settings.event_description {
                scheduler = scheduler.with_description(description.clone());
            }

            let plan = settings.plan(window.from.or(now).unwrap_or_else(Utc::now))?;
            let sink = RetryingSink::new(CollectingSink::default(), settings.retry.policy());

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, finishing in-flight events");
                    on_interrupt.cancel();
                }
            });

            let observer = |p: Progress| {
                info!(
                    completed = p.completed,
                    total = p.total,
                    remaining_seconds = p.remaining_estimate_seconds,
                    "progress"
                );
            };
            let options = ScheduleOptions::new()
                .with_observer(&observer)
                .with_cancellation(cancel);

            let report = scheduler
                .fetch_and_schedule(&tasks, &plan, &source, &sink, &options)
                .await
                .context("Failed to schedule tasks")?;

            let events = sink.into_inner().into_events();
            write_output(output.as_deref(), &serde_json::to_string_pretty(&events)?)?;
            print_summary(&report);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Settings from `--config` (or defaults), then flag overrides, then validation.
fn load_settings(path: Option<&Path>, overrides: SettingsOverrides) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            Settings::from_json_str(&raw)
                .with_context(|| format!("Invalid settings: {}", path.display()))?
        }
        None => Settings::default(),
    };
    overrides.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn load_busy(path: Option<&Path>) -> Result<FileBusySource> {
    match path {
        Some(path) => FileBusySource::load(path),
        None => Ok(FileBusySource::default()),
    }
}

/// `Scheduled X of Y tasks`, then one line per failed task, on stderr.
fn print_summary(report: &BatchReport) {
    eprintln!("Scheduled {} of {} tasks", report.succeeded(), report.total());
    for (task, failure) in report.failures() {
        eprintln!("  failed: {} ({})", task, failure);
    }
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
