// Exporter configuration
//
// Plain immutable snapshot built once at startup and shared read-only by the
// accumulator, the sender and the worker.

use crate::error::{ExporterError, Result};
use crate::security::ApiKey;
use crate::transport::Compression;
use std::time::Duration;

pub const ENV_PREFIX: &str = "TELEMETRY_EXPORTER_";

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Ingestion endpoint, `http://` or `https://`.
    pub endpoint_url: String,
    pub api_key: ApiKey,
    pub service_name: String,
    /// Records per batch before it is sealed by size.
    pub max_batch_size: usize,
    /// Tick period of the age-based flush.
    pub flush_interval: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retry_attempts: u32,
    pub backoff_base: Duration,
    /// Upper bound for a single computed backoff (a larger retry-after hint
    /// still wins).
    pub max_backoff: Duration,
    pub shutdown_drain_timeout: Duration,
    /// Sealed batches waiting per kind before the oldest is dropped.
    pub max_pending_batches: usize,
    pub request_timeout: Duration,
    /// Header carrying the API key.
    pub api_key_header: String,
    pub compression: Compression,
    /// Bytes of a rejected response body kept for diagnostics.
    pub error_body_excerpt_bytes: usize,
}

impl ExporterConfig {
    pub const DEFAULT_SERVICE_NAME: &'static str = "unknown_service";
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 512;
    pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5_000);
    pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
    pub const DEFAULT_SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_millis(10_000);
    pub const DEFAULT_MAX_PENDING_BATCHES: usize = 64;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_API_KEY_HEADER: &'static str = "x-api-key";
    pub const DEFAULT_ERROR_BODY_EXCERPT_BYTES: usize = 512;

    /// Configuration with defaults for everything except the two required
    /// values. Call [`validate`](Self::validate) (or construct an exporter,
    /// which does) before use.
    pub fn new(endpoint_url: impl Into<String>, api_key: impl Into<ApiKey>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
            service_name: Self::DEFAULT_SERVICE_NAME.to_string(),
            max_batch_size: Self::DEFAULT_MAX_BATCH_SIZE,
            flush_interval: Self::DEFAULT_FLUSH_INTERVAL,
            max_retry_attempts: Self::DEFAULT_MAX_RETRY_ATTEMPTS,
            backoff_base: Self::DEFAULT_BACKOFF_BASE,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
            shutdown_drain_timeout: Self::DEFAULT_SHUTDOWN_DRAIN_TIMEOUT,
            max_pending_batches: Self::DEFAULT_MAX_PENDING_BATCHES,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            api_key_header: Self::DEFAULT_API_KEY_HEADER.to_string(),
            compression: Compression::None,
            error_body_excerpt_bytes: Self::DEFAULT_ERROR_BODY_EXCERPT_BYTES,
        }
    }

    /// Reads `TELEMETRY_EXPORTER_*` variables from the process environment.
    ///
    /// `ENDPOINT` and `API_KEY` are required; every other variable falls
    /// back to its default. Durations are integer milliseconds.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = get("ENDPOINT").ok_or(ExporterError::MissingConfig("endpoint_url"))?;
        let api_key = get("API_KEY").ok_or(ExporterError::MissingConfig("api_key"))?;
        let mut config = Self::new(endpoint, api_key);

        if let Some(v) = get("SERVICE_NAME") {
            config.service_name = v;
        }
        if let Some(v) = get("MAX_BATCH_SIZE") {
            config.max_batch_size = parse_number("MAX_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("FLUSH_INTERVAL_MS") {
            config.flush_interval = parse_millis("FLUSH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("MAX_RETRY_ATTEMPTS") {
            config.max_retry_attempts = parse_number("MAX_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("BACKOFF_BASE_MS") {
            config.backoff_base = parse_millis("BACKOFF_BASE_MS", &v)?;
        }
        if let Some(v) = get("MAX_BACKOFF_MS") {
            config.max_backoff = parse_millis("MAX_BACKOFF_MS", &v)?;
        }
        if let Some(v) = get("SHUTDOWN_DRAIN_TIMEOUT_MS") {
            config.shutdown_drain_timeout = parse_millis("SHUTDOWN_DRAIN_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("MAX_PENDING_BATCHES") {
            config.max_pending_batches = parse_number("MAX_PENDING_BATCHES", &v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("API_KEY_HEADER") {
            config.api_key_header = v;
        }
        if let Some(v) = get("COMPRESSION") {
            config.compression = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the required values and the numeric bounds.
    ///
    /// Endpoint and API key are never defaulted: a missing one is a
    /// [`ExporterError::MissingConfig`].
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint_url.trim();
        if endpoint.is_empty() {
            return Err(ExporterError::MissingConfig("endpoint_url"));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ExporterError::InvalidConfig(format!(
                "endpoint_url must be an http:// or https:// URL, got '{}'",
                endpoint
            )));
        }
        if self.api_key.is_empty() {
            return Err(ExporterError::MissingConfig("api_key"));
        }
        if self.max_batch_size == 0 {
            return Err(ExporterError::InvalidConfig(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_pending_batches == 0 {
            return Err(ExporterError::InvalidConfig(
                "max_pending_batches must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "flush_interval must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.api_key_header.trim().is_empty() {
            return Err(ExporterError::InvalidConfig(
                "api_key_header must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        ExporterError::InvalidConfig(format!(
            "{}{} must be a non-negative integer, got '{}'",
            ENV_PREFIX, name, value
        ))
    })
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    parse_number::<u64>(name, value).map(Duration::from_millis)
}
