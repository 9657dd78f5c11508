use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{EventcastError, Result};

pub const DEFAULT_MAX_RETRY_COUNT: u32 = 10;
/// The backoff unit: failed attempt `n` waits `n` of these.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OBSERVER_CAPACITY: usize = 1024;

/// Root data directory, controlled by `DATA_DIR` (default: `"data"`).
pub fn data_dir() -> PathBuf {
    PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

/// Broadcaster settings. Fixed for the lifetime of a broadcaster.
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    pub endpoint_url: Url,
    pub max_retry_count: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    /// Where exhausted events are appended, and what is re-enqueued on start.
    pub failure_log_path: PathBuf,
    /// Buffer of the observer stream; observers that fall further behind skip ahead.
    pub observer_capacity: usize,
}

impl BroadcasterConfig {
    pub fn new(endpoint_url: Url) -> Self {
        Self {
            endpoint_url,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failure_log_path: data_dir().join("eventcast").join("failed-events.json"),
            observer_capacity: DEFAULT_OBSERVER_CAPACITY,
        }
    }

    /// Parse and validate an endpoint string.
    pub fn for_endpoint(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| EventcastError::Config(format!("invalid endpoint URL {endpoint:?}: {e}")))?;
        let config = Self::new(url);
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = count;
        self
    }

    pub fn with_retry_backoff(mut self, unit: Duration) -> Self {
        self.retry_backoff = unit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_failure_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log_path = path.into();
        self
    }

    pub fn with_observer_capacity(mut self, capacity: usize) -> Self {
        self.observer_capacity = capacity;
        self
    }

    /// Load from the process environment (and `.env`, if present).
    ///
    /// Env vars:
    /// - `EVENTCAST_ENDPOINT_URL`: required
    /// - `EVENTCAST_MAX_RETRY_COUNT`: default 10
    /// - `EVENTCAST_RETRY_BACKOFF_MS`: default 1000
    /// - `EVENTCAST_REQUEST_TIMEOUT_SECS`: default 30
    /// - `EVENTCAST_FAILURE_LOG`: default `{DATA_DIR}/eventcast/failed-events.json` (also when empty)
    /// - `EVENTCAST_OBSERVER_CAPACITY`: default 1024
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup("EVENTCAST_ENDPOINT_URL")
            .ok_or_else(|| EventcastError::Config("EVENTCAST_ENDPOINT_URL is not set".into()))?;
        let mut config = Self::for_endpoint(&endpoint)?;

        if let Some(count) = parse_var(&lookup, "EVENTCAST_MAX_RETRY_COUNT")? {
            config.max_retry_count = count;
        }
        if let Some(ms) = parse_var(&lookup, "EVENTCAST_RETRY_BACKOFF_MS")? {
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, "EVENTCAST_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("EVENTCAST_FAILURE_LOG").filter(|p| !p.is_empty()) {
            config.failure_log_path = PathBuf::from(path);
        }
        if let Some(capacity) = parse_var(&lookup, "EVENTCAST_OBSERVER_CAPACITY")? {
            config.observer_capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.endpoint_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(EventcastError::Config(format!(
                    "endpoint URL must be http or https, got {other}"
                )))
            }
        }
        if self.max_retry_count == 0 {
            return Err(EventcastError::Config(
                "max_retry_count must be at least 1".into(),
            ));
        }
        if self.observer_capacity == 0 {
            return Err(EventcastError::Config(
                "observer_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        tracing::info!("Eventcast config loaded:");
        tracing::info!("  endpoint: {}", self.endpoint_url);
        tracing::info!("  max_retry_count: {}", self.max_retry_count);
        tracing::info!("  retry_backoff: {:?}", self.retry_backoff);
        tracing::info!("  request_timeout: {:?}", self.request_timeout);
        tracing::info!("  failure_log: {}", self.failure_log_path.display());
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| EventcastError::Config(format!("{key}={raw:?}: {e}"))),
    }
}
