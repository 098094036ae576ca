//! `agenda` CLI — next-meeting snapshots and recurrence inspection from the
//! command line.
//!
//! ## Usage
//!
//! ```sh
//! # What matters now? (stdin → stdout)
//! curl -s https://example.com/team.ics | agenda snapshot
//!
//! # At a fixed instant, hiding one event, with a config file
//! agenda --config agenda.toml snapshot -i team.ics --at 2024-03-05T14:00:00Z --hide standup@example.com
//!
//! # Every occurrence in a window
//! agenda expand -i team.ics --from 2024-03-01T00:00:00Z --to 2024-04-01T00:00:00Z
//!
//! # Expand a bare RRULE
//! agenda rrule "FREQ=WEEKLY;BYDAY=TU,TH;COUNT=4" --dtstart 2026-03-03T09:00:00 --tz America/New_York
//!
//! # Where does a wall-clock time land?
//! agenda resolve --tz America/New_York 2026-03-08T02:30:00
//! ```
//!
//! Results are JSON on stdout. Logs go to stderr; `-v` raises the level and
//! `RUST_LOG` overrides it.

mod config;

use std::io::{self, Read};
use std::path::PathBuf;

use agenda_engine::{
    load_feed, occurrences, snapshot, Diagnostic, HiddenSet, Occurrence, Severity, TimezoneDatabase,
    Window,
};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agenda",
    version,
    about = "DST-correct recurrence expansion and next-meeting selection"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML file with engine options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Zone for floating times (overrides the config file)
    #[arg(long, global = true)]
    tz: Option<String>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the primary occurrence and project its countdown
    Snapshot {
        /// ICS file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Reference instant, RFC 3339 (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Event id to hide; repeatable
        #[arg(long)]
        hide: Vec<String>,
        /// Length of the upcoming list
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Expand every event of a feed over a window
    Expand {
        /// ICS file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Window start, RFC 3339
        #[arg(long)]
        from: String,
        /// Window end (exclusive), RFC 3339
        #[arg(long)]
        to: String,
    },
    /// Expand a single RRULE from a local DTSTART
    Rrule {
        /// RRULE text, with or without the `RRULE:` prefix
        rule: String,
        /// Local start, e.g. 2026-03-03T09:00:00
        #[arg(long)]
        dtstart: String,
        /// Length of each instance in minutes
        #[arg(long, default_value_t = 60)]
        duration: u32,
        /// Local end boundary (inclusive)
        #[arg(long)]
        until: Option<String>,
        /// Maximum number of instances
        #[arg(long)]
        count: Option<u32>,
    },
    /// Map a local wall-clock time to UTC, reporting DST adjustments
    Resolve {
        /// Local time, e.g. 2026-03-08T02:30:00
        local: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut options = config::load_options(cli.config.as_deref())?;
    if let Some(tz) = cli.tz {
        options.default_timezone = tz;
    }
    let db = TimezoneDatabase::global();

    match cli.command {
        Commands::Snapshot {
            input,
            output,
            at,
            hide,
            limit,
        } => {
            if let Some(limit) = limit {
                options.display_limit = limit;
            }
            let reference = match at.as_deref() {
                Some(at) => parse_instant(at)?,
                None => Utc::now(),
            };
            let ics = read_input(input.as_deref())?;
            let feed = load_feed(&ics, db, &options).context("Failed to read calendar feed")?;
            let hidden: HiddenSet = hide.into_iter().collect();

            let response = snapshot(&feed, &hidden, reference, db, &options, None);
            log_diagnostics(&response.diagnostics);
            write_output(output.as_deref(), &to_pretty_json(&response)?)?;
        }
        Commands::Expand {
            input,
            output,
            from,
            to,
        } => {
            let window = Window::new(parse_instant(&from)?, parse_instant(&to)?);
            if window.end < window.start {
                anyhow::bail!("--to must not be before --from");
            }
            let ics = read_input(input.as_deref())?;
            let feed = load_feed(&ics, db, &options).context("Failed to read calendar feed")?;

            let pool = occurrences(&feed, window, db, &options);
            log_diagnostics(&pool.diagnostics);
            write_output(output.as_deref(), &to_pretty_json(&pool)?)?;
        }
        Commands::Rrule {
            rule,
            dtstart,
            duration,
            until,
            count,
        } => {
            let instances = agenda_engine::expand_rrule(
                &rule,
                &dtstart,
                duration,
                &options.default_timezone,
                until.as_deref(),
                count,
            )
            .context("Failed to expand RRULE")?;
            let spans: Vec<Span> = instances.iter().map(Span::from).collect();
            write_output(None, &to_pretty_json(&spans)?)?;
        }
        Commands::Resolve { local } => {
            let local = NaiveDateTime::parse_from_str(&local, "%Y-%m-%dT%H:%M:%S")
                .with_context(|| format!("Invalid local time: {}", local))?;
            let zone = options.default_timezone.clone();
            let resolved = db
                .resolve_with(&zone, local, options.dst)
                .context("Failed to resolve local time")?;

            let report = Resolution {
                zone,
                local,
                instant: resolved.instant,
                diagnostic: resolved.diagnostic,
            };
            write_output(None, &to_pretty_json(&report)?)?;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct Span {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl From<&Occurrence> for Span {
    fn from(o: &Occurrence) -> Self {
        Self {
            start: o.start,
            end: o.end,
        }
    }
}

#[derive(Serialize)]
struct Resolution {
    zone: String,
    local: NaiveDateTime,
    instant: Option<DateTime<Utc>>,
    diagnostic: Option<Diagnostic>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// The engine returns diagnostics as values; the CLI is where they get logged.
fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let detail = serde_json::to_string(diagnostic).unwrap_or_default();
        match diagnostic.severity() {
            Severity::Error => tracing::error!(kind = diagnostic.kind(), %detail, "diagnostic"),
            Severity::Warning => tracing::warn!(kind = diagnostic.kind(), %detail, "diagnostic"),
            Severity::Info => tracing::info!(kind = diagnostic.kind(), %detail, "diagnostic"),
        }
    }
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC.
fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .with_context(|| format!("Invalid datetime: {}", s))
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    json.push('\n');
    Ok(json)
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
            print!("{}", content);
        }
    }
    Ok(())
}
