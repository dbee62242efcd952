//! Column mapping from NESO field names to the warehouse schema

use chrono::{DateTime, Utc};

use super::fields::{column_index, FIELDS, FIELD_COUNT};
use super::validate::ValidatedRecord;

/// One `generation_mix` row
///
/// `values` follows [`FIELDS`] order, so every row carries every column.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseRow {
    pub datetime_utc: DateTime<Utc>,
    pub values: [Option<f64>; FIELD_COUNT],
}

impl WarehouseRow {
    /// Anything missing from the payload comes out as `None`
    pub fn from_validated(record: &ValidatedRecord) -> Self {
        let mut values = [None; FIELD_COUNT];
        for (slot, f) in values.iter_mut().zip(FIELDS.iter()) {
            *slot = record.value(f.upstream);
        }

        Self {
            datetime_utc: record.timestamp,
            values,
        }
    }

    /// Value of a warehouse column, `None` for null or unknown columns
    pub fn get(&self, column: &str) -> Option<f64> {
        column_index(column).and_then(|i| self.values[i])
    }

    /// `(column, value)` pairs in schema order
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> + '_ {
        FIELDS.iter().zip(self.values.iter()).map(|(f, v)| (f.column, *v))
    }
}
