//! Pipeline configuration from environment variables
//!
//! Only the `from_env` constructors read process state. Everything else takes
//! a config value, so tests build configs directly.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_API: &str = "https://api.neso.energy/api/3/action";
pub const DEFAULT_RESOURCE_ID: &str = "f93d1835-75bc-43e5-84ad-12472b180a98";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVariable(String),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Upstream CKAN endpoint settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// CKAN action API root (no trailing slash)
    pub base_api: String,

    /// Datastore resource holding the generation mix table
    pub resource_id: String,

    /// Per-attempt HTTP timeout
    pub http_timeout: Duration,

    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_api: DEFAULT_BASE_API.to_string(),
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: concat!("genmix/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `NESO_BASE_API` (default: https://api.neso.energy/api/3/action)
    /// - `NESO_RESOURCE_ID` (default: the Historic GB Generation Mix resource)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_api: env::var("NESO_BASE_API")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_api),
            resource_id: env::var("NESO_RESOURCE_ID")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.resource_id),
            ..defaults
        }
    }

    /// Full URL of the SQL search action
    pub fn search_sql_url(&self) -> String {
        format!("{}/datastore_search_sql", self.base_api)
    }
}

/// Where the warehouse lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub target: DatabaseTarget,
}

impl DatabaseConfig {
    /// Parse a `DB_URL` value
    ///
    /// Accepted forms:
    /// - `sqlite::memory:` or `:memory:`
    /// - `sqlite://<path>` / `sqlite:<path>`
    /// - a plain file path
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingVariable("DB_URL".to_string()));
        }

        let target = match url {
            "sqlite::memory:" | ":memory:" | "sqlite://:memory:" => DatabaseTarget::Memory,
            _ => {
                let path = url
                    .strip_prefix("sqlite://")
                    .or_else(|| url.strip_prefix("sqlite:"))
                    .unwrap_or(url);
                if path.is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "DB_URL has no database path: {url}"
                    )));
                }
                if url.contains("://") && !url.starts_with("sqlite://") {
                    return Err(ConfigError::InvalidValue(format!(
                        "DB_URL must be a sqlite URL or a file path, got {url}"
                    )));
                }
                DatabaseTarget::File(PathBuf::from(path))
            }
        };

        Ok(Self { target })
    }

    /// Load `DB_URL` from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DB_URL")
            .map_err(|_| ConfigError::MissingVariable("DB_URL".to_string()))?;
        Self::parse(&url)
    }
}
