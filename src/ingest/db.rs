//! Warehouse store for the `generation_mix` table
//!
//! SQLite via rusqlite. `datetime_utc` is the natural key; every write is an
//! upsert, so re-ingesting an overlap window rewrites rows in place instead of
//! duplicating them.
//!
//! Schema reference: `sql/00_generation_mix.sql` (embedded at build time)

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ToSql};

use super::config::{DatabaseConfig, DatabaseTarget};
use super::error::IngestError;
use super::fields::{FIELDS, FIELD_COUNT, KEY_COLUMN};
use super::transform::WarehouseRow;

pub const TABLE: &str = "generation_mix";

/// Schema applied by `genmix-db --init-db`
pub const SCHEMA_SQL: &str = include_str!("../../sql/00_generation_mix.sql");

/// Storage seam used by the orchestrator
///
/// Tables written:
/// - `generation_mix` - UPSERT on `datetime_utc`
pub trait WarehouseStore {
    /// Latest `datetime_utc` stored, `None` for an empty table
    fn latest_timestamp(&mut self) -> Result<Option<DateTime<Utc>>, IngestError>;

    /// Upsert rows in one transaction
    ///
    /// Operation: INSERT ... ON CONFLICT(datetime_utc) DO UPDATE
    /// - If the timestamp exists: every non-key column is overwritten
    /// - Otherwise: a new row is inserted
    ///
    /// Returns the number of rows submitted. Empty input is a no-op.
    fn upsert_batch(&mut self, rows: &[WarehouseRow]) -> Result<usize, IngestError>;
}

fn all_columns() -> impl Iterator<Item = &'static str> {
    std::iter::once(KEY_COLUMN).chain(FIELDS.iter().map(|f| f.column))
}

fn build_upsert_sql() -> String {
    let columns = all_columns().collect::<Vec<_>>().join(", ");
    let placeholders = (1..=FIELD_COUNT + 1)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = FIELDS
        .iter()
        .map(|f| format!("{c} = excluded.{c}", c = f.column))
        .collect::<Vec<_>>()
        .join(",\n    ");

    format!(
        "INSERT INTO {TABLE} ({columns})\nVALUES ({placeholders})\n\
         ON CONFLICT({KEY_COLUMN}) DO UPDATE SET\n    {updates}"
    )
}

/// SQLite-backed warehouse
pub struct SqliteStore {
    conn: Connection,
    config: DatabaseConfig,
    upsert_sql: String,
}

impl SqliteStore {
    /// Open (or create) the database named by `config`
    ///
    /// Does NOT apply the schema; call [`SqliteStore::init_schema`] for that.
    pub fn open(config: &DatabaseConfig) -> Result<Self, IngestError> {
        let conn = Self::connect(&config.target)?;
        log::info!("Opened warehouse database ({})", describe(&config.target));

        Ok(Self {
            conn,
            config: config.clone(),
            upsert_sql: build_upsert_sql(),
        })
    }

    pub fn open_in_memory() -> Result<Self, IngestError> {
        Self::open(&DatabaseConfig {
            target: DatabaseTarget::Memory,
        })
    }

    fn connect(target: &DatabaseTarget) -> Result<Connection, IngestError> {
        let conn = match target {
            DatabaseTarget::Memory => Connection::open_in_memory()?,
            DatabaseTarget::File(path) => {
                ensure_parent_dir(path)?;
                let conn = Connection::open(path)?;
                let mode: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                log::debug!("SQLite journal_mode={mode}");
                conn
            }
        };
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Verify the connection before use, reopening a dropped file connection
    fn ensure_live(&mut self) -> Result<(), IngestError> {
        let ping = self
            .conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ());
        self.recover(ping)
    }

    /// Act on a ping result; in-memory databases cannot be reopened
    fn recover(&mut self, ping: rusqlite::Result<()>) -> Result<(), IngestError> {
        match (ping, &self.config.target) {
            (Ok(()), _) => Ok(()),
            (Err(e), DatabaseTarget::Memory) => Err(e.into()),
            (Err(e), target) => {
                log::warn!("Database ping failed ({e}); reconnecting");
                self.conn = Self::connect(target)?;
                Ok(())
            }
        }
    }

    /// Apply the schema; idempotent (`IF NOT EXISTS` throughout)
    pub fn init_schema(&mut self) -> Result<(), IngestError> {
        self.ensure_live()?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(SCHEMA_SQL)?;
        tx.commit()?;
        log::info!("Schema for {TABLE} applied");
        Ok(())
    }

    /// Stored rows with `start <= datetime_utc < end`, oldest first
    pub fn rows_between(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WarehouseRow>, IngestError> {
        self.ensure_live()?;
        let sql = format!(
            "SELECT {} FROM {TABLE} WHERE {KEY_COLUMN} >= ?1 AND {KEY_COLUMN} < ?2 ORDER BY {KEY_COLUMN}",
            all_columns().collect::<Vec<_>>().join(", ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([start, end], |row| {
                let mut values = [None; FIELD_COUNT];
                for (i, slot) in values.iter_mut().enumerate() {
                    *slot = row.get::<_, Option<f64>>(i + 1)?;
                }
                Ok(WarehouseRow {
                    datetime_utc: row.get(0)?,
                    values,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn row_count(&mut self) -> Result<u64, IngestError> {
        self.ensure_live()?;
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl WarehouseStore for SqliteStore {
    fn latest_timestamp(&mut self) -> Result<Option<DateTime<Utc>>, IngestError> {
        self.ensure_live()?;
        let latest = self.conn.query_row(
            &format!("SELECT MAX({KEY_COLUMN}) FROM {TABLE}"),
            [],
            |row| row.get::<_, Option<DateTime<Utc>>>(0),
        )?;
        Ok(latest)
    }

    fn upsert_batch(&mut self, rows: &[WarehouseRow]) -> Result<usize, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.ensure_live()?;

        // All rows commit together or not at all
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.upsert_sql)?;
            for row in rows {
                let mut params: Vec<&dyn ToSql> = Vec::with_capacity(FIELD_COUNT + 1);
                params.push(&row.datetime_utc);
                params.extend(row.values.iter().map(|v| v as &dyn ToSql));
                stmt.execute(params.as_slice())?;
            }
        }
        tx.commit()?;

        log::debug!("Upserted {} rows into {TABLE}", rows.len());
        Ok(rows.len())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), IngestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn describe(target: &DatabaseTarget) -> String {
    match target {
        DatabaseTarget::Memory => "in-memory".to_string(),
        DatabaseTarget::File(path) => path.display().to_string(),
    }
}
