//! End-to-end ingestion run
//!
//! One pass: compute window → clamp to stored data (incremental) → stream
//! pages → validate/transform → buffered upserts → final flush.
//!
//! Each flush is its own transaction. If a run dies halfway, committed
//! batches stay, and the next incremental run re-covers the gap through the
//! overlap window.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use super::backoff::Sleeper;
use super::client::{NesoClient, Transport};
use super::config::ConfigError;
use super::db::WarehouseStore;
use super::error::IngestError;
use super::transform::WarehouseRow;
use super::validate::validate_raw;
use super::window::{compute_window, iso, TimeWindow};

/// Rows buffered before a write
pub const BATCH_WRITE_SIZE: usize = 5000;

/// Records requested per upstream page
pub const DEFAULT_PAGE_SIZE: usize = 5000;

pub const DEFAULT_DAYS: i64 = 3;
pub const DEFAULT_OVERLAP_HOURS: i64 = 48;

/// Knobs for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Days back from the aligned hour when no explicit start is given
    pub days: i64,

    /// Hours before the latest stored row to re-fetch for corrections
    pub overlap_hours: i64,

    /// Upstream page size (LIMIT)
    pub batch_size: usize,

    /// Buffered rows that trigger a flush
    pub flush_threshold: usize,

    /// Inclusive lower bound override
    pub start: Option<DateTime<Utc>>,

    /// Exclusive upper bound override
    pub end: Option<DateTime<Utc>>,

    /// Clamp the start to stored data; off for full backfills
    pub incremental: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS,
            overlap_hours: DEFAULT_OVERLAP_HOURS,
            batch_size: DEFAULT_PAGE_SIZE,
            flush_threshold: BATCH_WRITE_SIZE,
            start: None,
            end: None,
            incremental: true,
        }
    }
}

impl RunOptions {
    /// Overlap as a duration; errors when it cannot be represented
    pub fn overlap(&self) -> Result<Duration, IngestError> {
        Duration::try_hours(self.overlap_hours).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "overlap of {} hours is out of range",
                self.overlap_hours
            ))
            .into()
        })
    }

    /// Check the window and overlap without touching any I/O
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), IngestError> {
        compute_window(now, self.days, self.start, self.end)?;
        self.overlap()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    /// Raw records pulled from upstream
    pub fetched: usize,

    /// Rows submitted to the warehouse
    pub upserted: usize,
}

impl fmt::Display for IngestionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetched={} upserted={}", self.fetched, self.upserted)
    }
}

/// Decide which window this run covers
///
/// Returns `None` when the incremental clamp leaves nothing to fetch.
pub fn plan_window<W: WarehouseStore>(
    options: &RunOptions,
    store: &mut W,
    now: DateTime<Utc>,
) -> Result<Option<TimeWindow>, IngestError> {
    let window = compute_window(now, options.days, options.start, options.end)?;
    let overlap = options.overlap()?;

    if !options.incremental {
        return Ok(Some(window));
    }

    match store.latest_timestamp()? {
        Some(latest) => {
            let clamped = window.clamp_incremental(latest, overlap);
            if clamped.is_none() {
                log::info!(
                    "Latest stored row {} minus {}h overlap is past window end {}; nothing to fetch",
                    iso(latest),
                    options.overlap_hours,
                    iso(window.end())
                );
            }
            Ok(clamped)
        }
        None => Ok(Some(window)),
    }
}

fn flush<W: WarehouseStore>(
    store: &mut W,
    buffer: &mut Vec<WarehouseRow>,
) -> Result<usize, IngestError> {
    let written = store.upsert_batch(buffer)?;
    log::info!("Flushed {} rows", written);
    buffer.clear();
    Ok(written)
}

/// Execute one ingestion pass
///
/// Arguments:
/// - `options`: window and batching settings
/// - `client`: upstream datastore client
/// - `store`: warehouse the rows are upserted into
/// - `now`: wall clock for relative windows (aligned down to the hour here)
///
/// Any fetch, validation or storage failure ends the run with an error.
pub async fn run_ingestion<T, S, W>(
    options: &RunOptions,
    client: &NesoClient<T, S>,
    store: &mut W,
    now: DateTime<Utc>,
) -> Result<IngestionStats, IngestError>
where
    T: Transport,
    S: Sleeper,
    W: WarehouseStore,
{
    let mut stats = IngestionStats::default();

    let Some(window) = plan_window(options, store, now)? else {
        return Ok(stats);
    };

    log::info!(
        "Ingesting [{}, {}) (page size {}, incremental: {})",
        iso(window.start()),
        iso(window.end()),
        options.batch_size,
        options.incremental
    );

    let threshold = options.flush_threshold.max(1);
    let mut buffer: Vec<WarehouseRow> = Vec::with_capacity(threshold.min(BATCH_WRITE_SIZE));
    let mut pages = client.pages(&window, options.batch_size, None);

    while let Some(page) = pages.next_page().await? {
        stats.fetched += page.len();

        for rec in &page {
            let model = validate_raw(rec)?;
            buffer.push(WarehouseRow::from_validated(&model));

            if buffer.len() >= threshold {
                stats.upserted += flush(store, &mut buffer)?;
            }
        }
    }

    if !buffer.is_empty() {
        stats.upserted += flush(store, &mut buffer)?;
    }

    log::info!("Run complete: {}", stats);
    Ok(stats)
}
