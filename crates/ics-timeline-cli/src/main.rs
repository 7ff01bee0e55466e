//! ics-timeline - list the event instances of an iCalendar feed
//!
//! Usage:
//!   ics-timeline --start 2026-01-01T00:00:00Z --end 2026-02-01T00:00:00Z feed.ics
//!   cat feed.ics | ics-timeline --start ... --end ... --pretty
//!
//! Prints a JSON array of event records on stdout. Diagnostics go to stderr.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use ics_timeline::{CalendarOptions, CalendarSet, ErrorPolicy, MergePolicy};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ics-timeline", version, about = "List the event instances of an iCalendar feed within a time range")]
struct Cli {
    /// ICS file to read (stdin when omitted)
    input: Option<PathBuf>,

    /// Window start, RFC 3339 (e.g. 2026-01-01T00:00:00Z)
    #[arg(long, value_parser = parse_timestamp)]
    start: DateTime<Utc>,

    /// Window end, RFC 3339, inclusive
    #[arg(long, value_parser = parse_timestamp)]
    end: DateTime<Utc>,

    /// Never let a generated occurrence replace an override; use SEQUENCE between equals
    #[arg(long)]
    prefer_overrides: bool,

    /// Skip events that fail to load or resolve instead of failing the whole feed
    #[arg(long)]
    skip_invalid_events: bool,

    /// Resolve TZIDs without a VTIMEZONE as IANA zone names
    #[arg(long)]
    iana_fallback: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Log loading and query details to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> CalendarOptions {
        CalendarOptions {
            merge_policy: if self.prefer_overrides {
                MergePolicy::PreferOverride
            } else {
                MergePolicy::LastWriteWins
            },
            error_policy: if self.skip_invalid_events {
                ErrorPolicy::SkipEvent
            } else {
                ErrorPolicy::AbortDocument
            },
            iana_fallback: self.iana_fallback,
        }
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// `--verbose` forces debug output; otherwise `RUST_LOG` applies, falling
/// back to warnings only.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn init_tracing(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.end < cli.start {
        bail!("--end ({}) is before --start ({})", cli.end, cli.start);
    }

    let text = read_input(cli.input.as_ref())?;
    let set = CalendarSet::from_ics_with_options(&text, &cli.options())
        .context("Failed to load calendar")?;
    let records = set
        .between(cli.start, cli.end)
        .context("Failed to resolve events")?;

    tracing::debug!(
        calendars = set.calendars.len(),
        records = records.len(),
        "Resolved window"
    );

    let json = if cli.pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}
