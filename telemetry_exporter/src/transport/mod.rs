// Transport layer for the export pipeline
//
// Console: prints encoded documents to stdout (for debugging)
// HTTP: posts documents to the ingestion endpoint with the API key header

pub mod console;
#[cfg(feature = "http")]
pub mod http;
pub mod payload;
pub mod retry;
pub mod sender;

pub use console::ConsoleTransport;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use payload::{Compression, ExportPayload};
pub use retry::{parse_retry_after, RetryPolicy};
pub use sender::{DrainDeadline, ExportOutcome, ExportReport, Sender};

use crate::error::Result;
use std::time::Duration;

/// Response metadata of one network call that reached the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    /// Leading bytes of the response body, kept for diagnostics.
    pub body_excerpt: String,
}

impl TransportResponse {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body_excerpt: String::new(),
        }
    }

    pub fn retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub fn body(mut self, excerpt: impl Into<String>) -> Self {
        self.body_excerpt = excerpt.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the network call for one encoded batch.
///
/// Implementations block; the sender runs them off the async threads and
/// stops waiting when the shutdown deadline passes. Network and connection
/// failures are returned as [`crate::ExporterError::Network`]; any response
/// that reached the endpoint, whatever its status, is `Ok`.
pub trait Transport: Send + Sync {
    fn send(&self, payload: &ExportPayload, timeout: Duration) -> Result<TransportResponse>;

    /// Get name of this transport (for logging).
    fn name(&self) -> &'static str {
        "Transport"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TransientFailure,
    PermanentFailure,
}

/// Maps a transport result onto the retry decision.
///
/// 2xx succeeds; 429 and 5xx are transient; every other status is
/// permanent, since the payload or credential itself was refused. Errors
/// are transient when [`crate::ExporterError::is_retryable`] says so.
pub fn classify(result: &Result<TransportResponse>) -> AttemptOutcome {
    match result {
        Ok(response) => match response.status {
            200..=299 => AttemptOutcome::Success,
            429 | 500..=599 => AttemptOutcome::TransientFailure,
            _ => AttemptOutcome::PermanentFailure,
        },
        Err(e) if e.is_retryable() => AttemptOutcome::TransientFailure,
        Err(_) => AttemptOutcome::PermanentFailure,
    }
}

/// One transmission try of a sealed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportAttempt {
    /// 1-based.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
    pub error: Option<String>,
    /// Wait scheduled before the next attempt, if one was scheduled.
    pub backoff: Option<Duration>,
}

impl ExportAttempt {
    pub fn from_result(attempt: u32, result: &Result<TransportResponse>, excerpt_bytes: usize) -> Self {
        let outcome = classify(result);
        match result {
            Ok(response) => Self {
                attempt,
                outcome,
                status: Some(response.status),
                retry_after: response.retry_after,
                error: (outcome != AttemptOutcome::Success).then(|| {
                    let excerpt = truncate_utf8(&response.body_excerpt, excerpt_bytes);
                    if excerpt.is_empty() {
                        format!("HTTP {}", response.status)
                    } else {
                        format!("HTTP {}: {}", response.status, excerpt)
                    }
                }),
                backoff: None,
            },
            Err(e) => Self {
                attempt,
                outcome,
                status: None,
                retry_after: None,
                error: Some(e.to_string()),
                backoff: None,
            },
        }
    }

    pub fn detail(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| match self.status {
                Some(status) => format!("HTTP {}", status),
                None => "no response".to_string(),
            })
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a char.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
