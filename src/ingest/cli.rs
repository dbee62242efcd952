//! Command-line arguments for `genmix-ingest` and `genmix-db`
//!
//! Parsing lives here so the binaries stay thin and the flag handling can be
//! tested with `try_parse_from`.

use chrono::{DateTime, Utc};
use clap::Parser;

use super::config::ConfigError;
use super::error::IngestError;
use super::run::{
    RunOptions, BATCH_WRITE_SIZE, DEFAULT_DAYS, DEFAULT_OVERLAP_HOURS, DEFAULT_PAGE_SIZE,
};

/// Longest accepted lookback, roughly a century
pub const MAX_DAYS: i64 = 36_500;

/// Longest accepted overlap, the same century in hours
pub const MAX_OVERLAP_HOURS: i64 = MAX_DAYS * 24;
use super::window::parse_utc;

/// Incremental ingestion of the NESO Historic GB Generation Mix
#[derive(Debug, Parser, Clone)]
#[command(name = "genmix-ingest", version)]
pub struct IngestArgs {
    /// Days back from the current hour when --start-date is not given
    #[arg(
        long,
        default_value_t = DEFAULT_DAYS,
        value_parser = clap::value_parser!(i64).range(0..=MAX_DAYS)
    )]
    pub days: i64,

    /// Hours before the latest stored row to re-fetch
    #[arg(
        long,
        default_value_t = DEFAULT_OVERLAP_HOURS,
        value_parser = clap::value_parser!(i64).range(0..=MAX_OVERLAP_HOURS)
    )]
    pub overlap_hours: i64,

    /// Upstream page size
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub batch_size: usize,

    /// Inclusive start (ISO-8601, UTC assumed when no offset is given)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Exclusive end (ISO-8601, UTC assumed when no offset is given)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Ignore stored data and fetch the whole requested window
    #[arg(long)]
    pub no_incremental: bool,
}

fn parse_flag(flag: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_utc(raw).map(Some).ok_or_else(|| {
            ConfigError::InvalidValue(format!("{flag}: {raw:?} is not an ISO-8601 date"))
        }),
    }
}

impl IngestArgs {
    pub fn into_options(self) -> Result<RunOptions, IngestError> {
        Ok(RunOptions {
            days: self.days,
            overlap_hours: self.overlap_hours,
            batch_size: self.batch_size.max(1),
            flush_threshold: BATCH_WRITE_SIZE,
            start: parse_flag("--start-date", self.start_date.as_deref())?,
            end: parse_flag("--end-date", self.end_date.as_deref())?,
            incremental: !self.no_incremental,
        })
    }
}

/// Warehouse schema utility
#[derive(Debug, Parser, Clone)]
#[command(name = "genmix-db", version)]
pub struct DbArgs {
    /// Create the generation_mix table and indexes (safe to repeat)
    #[arg(long)]
    pub init_db: bool,
}
