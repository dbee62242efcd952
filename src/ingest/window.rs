//! Ingestion time windows
//!
//! A window is half-open, `[start, end)`, so adjacent windows never share a
//! boundary row. `now` is always passed in; nothing here reads the clock.

use chrono::{DateTime, Duration, DurationRound, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use super::config::ConfigError;
use super::error::IngestError;

/// Cushion added past the aligned hour so rows that land slightly early are
/// still picked up
pub const END_CUSHION_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting `end <= start`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, IngestError> {
        if end <= start {
            return Err(IngestError::InvalidWindow {
                start: iso(start),
                end: iso(end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Move `start` forward to `latest - overlap` if that is later
    ///
    /// The end never moves. Returns `None` when the clamped start reaches the
    /// end, i.e. there is nothing left to fetch. An overlap reaching past the
    /// earliest representable time leaves `start` alone.
    pub fn clamp_incremental(&self, latest: DateTime<Utc>, overlap: Duration) -> Option<Self> {
        let start = match latest.checked_sub_signed(overlap) {
            Some(floor) => self.start.max(floor),
            None => self.start,
        };
        if start >= self.end {
            return None;
        }
        Some(Self {
            start,
            end: self.end,
        })
    }
}

/// Truncate to the top of the hour
pub fn align_to_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    // duration_trunc only fails for out-of-range timestamps
    now.duration_trunc(Duration::hours(1)).unwrap_or(now)
}

/// Compute the initial window for a run
///
/// - `start` = explicit override, else aligned now minus `days`
/// - `end` = explicit override, else aligned now plus the cushion
pub fn compute_window(
    now: DateTime<Utc>,
    days: i64,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<TimeWindow, IngestError> {
    let aligned = align_to_hour(now);
    let start = match start {
        Some(start) => start,
        None => Duration::try_days(days)
            .and_then(|lookback| aligned.checked_sub_signed(lookback))
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!("lookback of {days} days is out of range"))
            })?,
    };
    let end = match end {
        Some(end) => end,
        None => aligned
            .checked_add_signed(Duration::minutes(END_CUSHION_MINUTES))
            .ok_or_else(|| ConfigError::InvalidValue(format!("{} is out of range", iso(now))))?,
    };
    TimeWindow::new(start, end)
}

/// ISO-8601 UTC rendering used in upstream queries and messages
///
/// Sub-second digits are kept when present so query bounds stay exact.
pub fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Naive layouts taken as UTC when a timestamp carries no offset
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 string into UTC
///
/// Accepts RFC 3339 (`Z` or any offset), naive date-times (read as UTC) and
/// bare dates (midnight UTC).
pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
