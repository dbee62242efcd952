//! Validation and typing of raw CKAN records
//!
//! - Timestamp comes from `DATETIME` and is required
//! - Known numeric fields are coerced to `Option<f64>`; blanks and garbage
//!   become `None`
//! - Unknown keys are dropped
//!
//! Only a missing or unreadable timestamp fails a record. Bad numbers never do.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::client::RawRecord;
use super::error::IngestError;
use super::fields::{FIELDS, TIMESTAMP_FIELD};
use super::window::parse_utc;

/// Numeric payload keyed by upstream field name
///
/// Keys are always a subset of [`FIELDS`] upstream names. A key maps to
/// `None` when the record carried the field but its value was blank or not a
/// number; absent fields have no key at all.
pub type Payload = BTreeMap<&'static str, Option<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: Payload,
}

impl ValidatedRecord {
    /// Value for an upstream key, `None` if absent or null
    pub fn value(&self, upstream: &str) -> Option<f64> {
        self.payload.get(upstream).copied().flatten()
    }
}

/// Validate one raw record
pub fn validate_raw(rec: &RawRecord) -> Result<ValidatedRecord, IngestError> {
    let timestamp = match rec.get(TIMESTAMP_FIELD) {
        None | Some(Value::Null) => {
            return Err(IngestError::MissingField(TIMESTAMP_FIELD.to_string()))
        }
        Some(v) => parse_timestamp(v)?,
    };

    let mut payload = Payload::new();
    for f in FIELDS.iter() {
        if let Some(v) = rec.get(f.upstream) {
            payload.insert(f.upstream, coerce_number(v));
        }
    }

    Ok(ValidatedRecord { timestamp, payload })
}

/// Parse an upstream timestamp into UTC
///
/// Strings go through [`parse_utc`]. Integers are Unix epoch seconds.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, IngestError> {
    let invalid = || IngestError::InvalidTimestamp {
        value: value.to_string(),
    };

    match value {
        Value::String(s) => parse_utc(s).ok_or_else(invalid),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Coerce a raw value to a float, `None` for anything that isn't one
pub fn coerce_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
