//! # Generation Mix Ingestion Pipeline
//!
//! Pulls the Historic GB Generation Mix from the NESO CKAN datastore and
//! upserts it into the `generation_mix` table.
//!
//! ## Data Flow
//!
//! 1. `run` computes a half-open UTC window `[start, end)`
//! 2. Incremental mode clamps `start` to `latest stored - overlap`
//! 3. `client` streams pages (`LIMIT`/`OFFSET`, ascending `DATETIME`)
//! 4. Each raw record goes through `validate` then `transform`
//! 5. Rows buffer in memory and `db` flushes them as upsert transactions
//!
//! Re-running over an overlapping window is safe: `datetime_utc` is the
//! natural key and every write is `INSERT ... ON CONFLICT DO UPDATE`.
//!
//! ## Module Organization
//!
//! - `fields` - Upstream key ↔ warehouse column table
//! - `config` - Environment-driven configuration values
//! - `error` - Pipeline error type and exit codes
//! - `window` - Time window computation and incremental clamp
//! - `backoff` - Retry schedule and pluggable sleep
//! - `client` - CKAN `datastore_search_sql` fetcher
//! - `validate` - Raw record → typed record
//! - `transform` - Typed record → warehouse row
//! - `db` - SQLite store (schema, upsert, latest timestamp)
//! - `run` - Orchestrator
//! - `cli` - Argument definitions for the binaries

pub mod backoff;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod run;
pub mod transform;
pub mod validate;
pub mod window;

// Re-export commonly used types
pub use client::{HttpTransport, NesoClient, PageCursor, RawRecord, Transport};
pub use config::{DatabaseConfig, UpstreamConfig};
pub use db::{SqliteStore, WarehouseStore};
pub use error::IngestError;
pub use run::{run_ingestion, IngestionStats, RunOptions};
pub use transform::WarehouseRow;
pub use validate::{validate_raw, ValidatedRecord};
pub use window::TimeWindow;
