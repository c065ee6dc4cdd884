//! Environment-driven settings.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::bulk_load::DEFAULT_LOAD_CONCURRENCY;
use crate::indexer::{BatchIndexerConfig, DEFAULT_BULK_ACTIONS, DEFAULT_FLUSH_INTERVAL};
use crate::SyncError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default index alias.
const DEFAULT_INDEX_ALIAS: &str = "persons";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every retry interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// "json" (case-insensitive) selects JSON; anything else is pretty console output.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(format) if format.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }

    /// Read `LOG_FORMAT`. Used before the rest of the settings so that parsing them is
    /// already logged.
    pub fn from_env() -> Self {
        Self::parse(env::var("LOG_FORMAT").ok().as_deref())
    }
}

/// Everything the loader needs to start, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch_url: String,
    pub index_alias: String,
    pub index_version: u32,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    /// PostgreSQL URL. Without one, persons are kept in memory.
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub indexer: BatchIndexerConfig,
    pub load_concurrency: usize,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_ALIAS`: Index alias name (default: "persons")
    /// - `PERSONS_INDEX_VERSION`: Index version number (default: 0)
    /// - `OPENSEARCH_CONNECTION_MODE`: Connection mode - "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `DATABASE_URL`: PostgreSQL URL (default: unset, in-memory store)
    /// - `DATABASE_MAX_CONNECTIONS`: Connection pool size (default: 20)
    /// - `BULK_ACTIONS`: Buffered operations that trigger a flush (default: 10000)
    /// - `FLUSH_INTERVAL_SECS`: Maximum seconds between flushes (default: 5)
    /// - `LOAD_CONCURRENCY`: Concurrent saves during a bulk load (default: 8)
    /// - `LOG_FORMAT`: "json" or "pretty" (default: pretty)
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let opensearch_url =
            lookup("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string());
        let index_alias =
            lookup("INDEX_ALIAS").unwrap_or_else(|| DEFAULT_INDEX_ALIAS.to_string());
        if index_alias.trim().is_empty() {
            return Err(SyncError::config("INDEX_ALIAS cannot be empty"));
        }

        let index_version = parse_or(&lookup, "PERSONS_INDEX_VERSION", 0u32)?;
        let connection_mode =
            ConnectionMode::parse(lookup("OPENSEARCH_CONNECTION_MODE").as_deref());
        let retry_interval = Duration::from_secs(parse_or(
            &lookup,
            "OPENSEARCH_RETRY_INTERVAL_SECS",
            DEFAULT_RETRY_INTERVAL_SECS,
        )?);

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .map(|v| {
                v.parse::<u32>().map_err(|e| {
                    SyncError::config(format!("Invalid DATABASE_MAX_CONNECTIONS '{}': {}", v, e))
                })
            })
            .transpose()?;

        let bulk_actions = parse_or(&lookup, "BULK_ACTIONS", DEFAULT_BULK_ACTIONS)?;
        let flush_interval = Duration::from_secs(parse_or(
            &lookup,
            "FLUSH_INTERVAL_SECS",
            DEFAULT_FLUSH_INTERVAL.as_secs(),
        )?);

        let load_concurrency = parse_or(&lookup, "LOAD_CONCURRENCY", DEFAULT_LOAD_CONCURRENCY)?;

        let log_format = LogFormat::parse(lookup("LOG_FORMAT").as_deref());

        Ok(Self {
            opensearch_url,
            index_alias,
            index_version,
            connection_mode,
            retry_interval,
            database_url,
            database_max_connections,
            indexer: BatchIndexerConfig::new(bulk_actions, flush_interval),
            load_concurrency: load_concurrency.max(1),
            log_format,
        })
    }
}

/// Parse variable `key`, falling back to `default` when it is unset.
///
/// A set but malformed value is a configuration error rather than a silent default.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, SyncError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| SyncError::config(format!("Invalid {} '{}': {}", key, value, e))),
    }
}
