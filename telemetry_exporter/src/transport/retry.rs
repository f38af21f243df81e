use crate::config::ExporterConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Maximum relative jitter applied to each computed backoff.
pub const JITTER_RATIO: f64 = 0.2;

/// Exponential backoff with jitter and a ceiling.
///
/// The delay before retry `n` (0-based) is `backoff_base * 2^n`, scaled by
/// a random factor in `[1 - JITTER_RATIO, 1 + JITTER_RATIO]` and capped at
/// `max_backoff`. Because the jitter is smaller than the doubling, delays
/// never shrink from one retry to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry_attempts: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retry_attempts: u32, backoff_base: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retry_attempts,
            backoff_base,
            max_backoff,
        }
    }

    pub fn from_config(config: &ExporterConfig) -> Self {
        Self::new(
            config.max_retry_attempts,
            config.backoff_base,
            config.max_backoff,
        )
    }

    /// Total transmissions allowed for one batch.
    pub fn max_attempts(&self) -> u32 {
        self.max_retry_attempts.saturating_add(1)
    }

    pub fn can_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retry_attempts
    }

    /// Deterministic backoff for retry `retry` with a given jitter factor,
    /// clamped to `[-JITTER_RATIO, JITTER_RATIO]`.
    pub fn backoff(&self, retry: u32, jitter: f64) -> Duration {
        let jitter = jitter.clamp(-JITTER_RATIO, JITTER_RATIO);
        let exponential = self.backoff_base.as_secs_f64() * 2f64.powi(retry.min(62) as i32);
        let jittered = exponential * (1.0 + jitter);
        let capped = jittered.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Randomized delay before retry `retry`. A server-provided
    /// `retry_after` wins when it is longer.
    pub fn next_delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let jitter = rand::rng().random_range(-JITTER_RATIO..=JITTER_RATIO);
        let computed = self.backoff(retry, jitter);
        match retry_after {
            Some(hint) => computed.max(hint),
            None => computed,
        }
    }
}

/// Parses a `Retry-After` header value: delta-seconds or an HTTP-date.
/// Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        at.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
