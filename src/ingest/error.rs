//! Pipeline error type
//!
//! Every failure that ends a run is an [`IngestError`]. Numeric coercion
//! problems never get here; they are absorbed as nulls in `validate`.

use thiserror::Error;

use super::client::TransportError;
use super::config::ConfigError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid window: end {end} is not after start {start}")]
    InvalidWindow { start: String, end: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("upstream fetch failed after {attempts} attempts: {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("record is missing required field {0}")]
    MissingField(String),

    #[error("record has unparsable timestamp {value}")]
    InvalidTimestamp { value: String },

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Process exit code for this failure
    ///
    /// Startup problems (configuration, bad window) use 2, the same code the
    /// schema utility uses for a missing `DB_URL`. Everything else is 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            IngestError::Config(_) | IngestError::InvalidWindow { .. } => 2,
            _ => 1,
        }
    }
}
