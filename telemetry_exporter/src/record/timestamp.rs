// Timestamp normalization
//
// Every record crossing the pipeline carries its time as milliseconds since
// the Unix epoch, independent of the zone the caller expressed it in.

use chrono::{DateTime, Utc};

/// Converts an instant into milliseconds since 1970-01-01T00:00:00Z.
///
/// Accepts anything chrono can turn into a UTC instant: `DateTime<Utc>`,
/// `DateTime<Local>`, `DateTime<FixedOffset>` and `SystemTime`. Two values
/// denoting the same absolute moment normalize to the same number whatever
/// zone they were expressed in.
///
/// Sub-millisecond precision is discarded, never rounded up.
pub fn to_epoch_millis<T>(instant: T) -> i64
where
    T: Into<DateTime<Utc>>,
{
    instant.into().timestamp_millis()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_millis() -> i64 {
    to_epoch_millis(Utc::now())
}
