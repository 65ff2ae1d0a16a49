//! Command-line interface definitions for the tag search daemon.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use time::OffsetDateTime;

/// Command-line arguments for the tag search daemon.
#[derive(Debug, Parser)]
#[command(name = "tagsearchd")]
#[command(author, version, about = "Metric/tag search index and alert silence API")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8070")]
    pub listen: String,

    /// Delay between the first ingestion and the snapshot publish (e.g. 30s, 1m)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1m")]
    pub publish_delay: Duration,

    /// JSON file silences are persisted to; in-memory only when omitted
    #[arg(long)]
    pub silence_file: Option<PathBuf>,

    /// Fixed "now" time (ISO-8601, e.g. 2030-06-01T00:00:00Z)
    #[arg(long, value_parser = parse_time)]
    pub fixed_now: Option<OffsetDateTime>,
}

/// Parse time string into `OffsetDateTime`.
///
/// # Errors
///
/// Returns error if the input string is not a valid RFC3339 timestamp.
fn parse_time(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
        .map_err(|e| format!("invalid datetime: {e}"))
}
