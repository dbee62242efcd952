//! NESO CKAN datastore client
//!
//! Fetches Historic GB Generation Mix rows for a UTC window through the CKAN
//! `datastore_search_sql` action.
//!
//! ## API Reference
//!
//! Endpoint: `{NESO_BASE_API}/datastore_search_sql?sql=...`
//! Returns: `{"result": {"records": [{"DATETIME": ..., "GAS": ..., ...}]}}`
//!
//! ## Paging
//!
//! Offset-based. Each page re-issues the same ordered query with
//! `LIMIT batch_size OFFSET running_count`. If upstream rows change between
//! page requests a boundary row can be skipped or repeated; incremental runs
//! re-fetch an overlap so the next run reconciles it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn demo(window: genmix::ingest::TimeWindow) -> Result<(), genmix::ingest::IngestError> {
//! use genmix::ingest::{NesoClient, UpstreamConfig};
//!
//! let client = NesoClient::from_config(&UpstreamConfig::from_env())?;
//! let mut pages = client.pages(&window, 5000, None);
//! while let Some(page) = pages.next_page().await? {
//!     println!("{} records", page.len());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::backoff::{ExponentialBackoff, Sleeper, TokioSleeper};
use super::config::UpstreamConfig;
use super::error::IngestError;
use super::fields::TIMESTAMP_FIELD;
use super::window::{iso, TimeWindow};

/// One upstream record, exactly as CKAN returned it
pub type RawRecord = Map<String, Value>;

/// Failure of a single HTTP attempt
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("undecodable response body: {0}")]
    Decode(String),
}

/// CKAN response envelope
///
/// Missing `result` or `records` are treated as an empty page.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatastoreResponse {
    #[serde(default)]
    pub result: Option<DatastoreResult>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatastoreResult {
    #[serde(default)]
    pub records: Option<Vec<RawRecord>>,
}

impl DatastoreResponse {
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self {
            result: Some(DatastoreResult {
                records: Some(records),
            }),
        }
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        self.result.and_then(|r| r.records).unwrap_or_default()
    }
}

/// A single attempt at running a datastore SQL query
///
/// No retries here; [`NesoClient`] owns the retry loop.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn search_sql(&self, sql: &str) -> Result<DatastoreResponse, TransportError>;
}

/// `reqwest`-backed transport with a bounded timeout and fixed User-Agent
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            url: config.search_sql_url(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn search_sql(&self, sql: &str) -> Result<DatastoreResponse, TransportError> {
        let response = self.client.get(&self.url).query(&[("sql", sql)]).send().await?;
        check_status(response.status())?;

        response
            .json::<DatastoreResponse>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Any non-2xx answer is a failed attempt
fn check_status(status: reqwest::StatusCode) -> Result<(), TransportError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status(status.as_u16()))
    }
}

/// Quote a column identifier unless it already is
fn quote_ident(name: &str) -> String {
    if name.starts_with('"') {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Build the base (unpaged) query for a window
///
/// Selects `columns` (or `*`), keeps rows with `start <= DATETIME < end`,
/// ordered ascending so offset paging is deterministic.
pub fn build_sql(
    resource_id: &str,
    start_iso: &str,
    end_iso: &str,
    columns: Option<&[&str]>,
) -> String {
    let select_cols = match columns {
        Some(cols) if !cols.is_empty() => cols
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(","),
        _ => "*".to_string(),
    };
    let ts = quote_ident(TIMESTAMP_FIELD);

    format!(
        "SELECT {select_cols} FROM {resource} WHERE {ts} >= '{start_iso}' AND {ts} < '{end_iso}' ORDER BY {ts} ASC",
        resource = quote_ident(resource_id),
    )
}

/// Datastore client: query building, paging and retry
pub struct NesoClient<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    resource_id: String,
}

impl NesoClient<HttpTransport> {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, IngestError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(transport, TokioSleeper, config.resource_id.clone()))
    }
}

impl<T: Transport, S: Sleeper> NesoClient<T, S> {
    pub fn new(transport: T, sleeper: S, resource_id: impl Into<String>) -> Self {
        Self {
            transport,
            sleeper,
            resource_id: resource_id.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn build_sql(&self, window: &TimeWindow, columns: Option<&[&str]>) -> String {
        build_sql(
            &self.resource_id,
            &iso(window.start()),
            &iso(window.end()),
            columns,
        )
    }

    /// Fetch one page, retrying transient failures
    ///
    /// Up to 5 attempts with 1s, 2s, 4s, 8s waits in between. The error from
    /// the last attempt is returned once attempts run out.
    pub async fn fetch_sql(
        &self,
        sql: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RawRecord>, IngestError> {
        let paged = format!("{sql} LIMIT {limit} OFFSET {offset}");
        let mut backoff = ExponentialBackoff::for_fetch();

        loop {
            match self.transport.search_sql(&paged).await {
                Ok(response) => return Ok(response.into_records()),
                Err(err) => match backoff.next_delay() {
                    Some(delay) => {
                        log::warn!(
                            "Upstream attempt {} of {} failed (offset {}): {}; retrying in {}s",
                            backoff.attempts(),
                            backoff.max_attempts(),
                            offset,
                            err,
                            delay.as_secs()
                        );
                        self.sleeper.sleep(delay).await;
                    }
                    None => {
                        return Err(IngestError::Fetch {
                            attempts: backoff.attempts(),
                            source: err,
                        })
                    }
                },
            }
        }
    }

    /// Page through every record in `window`
    ///
    /// The returned cursor is single-use; call again to restart from the
    /// beginning of the window.
    pub fn pages(
        &self,
        window: &TimeWindow,
        batch_size: usize,
        columns: Option<&[&str]>,
    ) -> PageCursor<'_, T, S> {
        PageCursor {
            client: self,
            sql: self.build_sql(window, columns),
            batch_size: batch_size.max(1),
            offset: 0,
            done: false,
        }
    }
}

/// Lazy, finite sequence of pages for one window
pub struct PageCursor<'a, T, S> {
    client: &'a NesoClient<T, S>,
    sql: String,
    batch_size: usize,
    offset: usize,
    done: bool,
}

impl<'a, T: Transport, S: Sleeper> PageCursor<'a, T, S> {
    /// Next page, or `None` when the window is exhausted
    ///
    /// Stops after an empty page, or right after a short page
    /// (`len < batch_size`) without another request.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>, IngestError> {
        if self.done {
            return Ok(None);
        }

        let records = match self
            .client
            .fetch_sql(&self.sql, self.batch_size, self.offset)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        if records.is_empty() {
            self.done = true;
            return Ok(None);
        }

        log::debug!(
            "Fetched page at offset {} ({} records)",
            self.offset,
            records.len()
        );

        self.offset += records.len();
        if records.len() < self.batch_size {
            self.done = true;
        }

        Ok(Some(records))
    }
}
