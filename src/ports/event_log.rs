//! Event log port - durable, ordered record of stream events.
//!
//! One log exists per bot reply, keyed by [`StreamKey`]. Appends return
//! a monotonically increasing [`Cursor`] so clients can name the last
//! event they received. The log is an availability buffer, not a system
//! of record: callers must treat every operation as fallible and keep
//! streaming live when it is down.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::streaming::{Cursor, StreamEvent, StreamKey};

/// An event together with the log position it was written at.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub cursor: Cursor,
    pub event: StreamEvent,
}

/// Durable ordered log of per-reply stream events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an event, returning the cursor it was written at.
    async fn append(&self, key: &StreamKey, event: &StreamEvent) -> Result<Cursor, EventLogError>;

    /// Reads events strictly after `after`, oldest first.
    ///
    /// With `after = None` the whole log is returned. An expired or
    /// never-written log yields an empty list, not an error.
    async fn range(
        &self,
        key: &StreamKey,
        after: Option<&Cursor>,
    ) -> Result<Vec<LoggedEvent>, EventLogError>;

    /// Schedules the log for deletion after `ttl`.
    async fn expire(&self, key: &StreamKey, ttl: Duration) -> Result<(), EventLogError>;
}

/// Errors from the event log.
#[derive(Debug, Clone, Error)]
pub enum EventLogError {
    /// Log store is unreachable or refused the command.
    #[error("event log unavailable: {0}")]
    Unavailable(String),

    /// Event could not be encoded or decoded.
    #[error("event serialization failed: {0}")]
    Serialization(String),
}

impl EventLogError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        EventLogError::Unavailable(message.into())
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        EventLogError::Serialization(message.into())
    }
}
