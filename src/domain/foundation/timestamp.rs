//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Out-of-range values clamp to the Unix epoch.
    pub fn from_unix_secs(secs: u64) -> Self {
        let dt = DateTime::from_timestamp(secs as i64, 0).unwrap_or(DateTime::UNIX_EPOCH);
        Self(dt)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> u64 {
        self.0.timestamp() as u64
    }

    /// Creates a new timestamp by adding the specified number of seconds.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0 + Duration::seconds(secs as i64))
    }

    /// Formats the timestamp as an RFC 3339 string.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}
