//! In-memory event log implementation for testing.
//!
//! Provides synchronous, deterministic log behavior for unit tests,
//! including a switchable failure mode to exercise degraded streaming.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are
//! poisoned. Production code should use the Redis event log adapter.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use crate::domain::streaming::{Cursor, StreamEvent, StreamKey};
use crate::ports::{EventLog, EventLogError, LoggedEvent};

/// In-memory event log for testing.
///
/// Features:
/// - Cursor minting in the same `millis-seq` shape the Redis log uses
/// - A failure switch so tests can simulate a down log store
/// - Inspection helpers for entries and recorded TTLs
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned. This is acceptable
/// for test code but this adapter should NOT be used in production.
///
/// # Example
///
/// ```ignore
/// let log = InMemoryEventLog::new();
///
/// let cursor = log.append(&key, &event).await?;
///
/// // Assert in tests
/// assert_eq!(log.event_count(&key), 1);
/// log.set_failing(true);
/// assert!(log.append(&key, &event).await.is_err());
/// ```
pub struct InMemoryEventLog {
    entries: RwLock<HashMap<StreamKey, Vec<LoggedEvent>>>,
    ttls: RwLock<HashMap<StreamKey, Duration>>,
    clock: Mutex<(u64, u64)>,
    failing: AtomicBool,
}

impl InMemoryEventLog {
    /// Creates a new empty event log.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttls: RwLock::new(HashMap::new()),
            clock: Mutex::new((0, 0)),
            failing: AtomicBool::new(false),
        }
    }

    /// Mints the next cursor, bumping the sequence within one millisecond.
    fn next_cursor(&self) -> Cursor {
        let mut clock = self
            .clock
            .lock()
            .expect("InMemoryEventLog: clock lock poisoned");
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        if millis == clock.0 {
            clock.1 += 1;
        } else {
            *clock = (millis, 0);
        }
        Cursor::new(format!("{}-{}", clock.0, clock.1))
    }

    fn check_available(&self) -> Result<(), EventLogError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EventLogError::unavailable("simulated outage"));
        }
        Ok(())
    }

    // === Test Helpers ===

    /// Switches every operation between healthy and failing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns all logged entries for a stream (for test assertions).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn events(&self, key: &StreamKey) -> Vec<LoggedEvent> {
        self.entries
            .read()
            .expect("InMemoryEventLog: entries lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the entry count for a stream.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn event_count(&self, key: &StreamKey) -> usize {
        self.entries
            .read()
            .expect("InMemoryEventLog: entries lock poisoned")
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Returns the last TTL recorded for a stream, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn ttl_for(&self, key: &StreamKey) -> Option<Duration> {
        self.ttls
            .read()
            .expect("InMemoryEventLog: ttls lock poisoned")
            .get(key)
            .copied()
    }

    /// Drops a stream's entries, simulating TTL expiry.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn evict(&self, key: &StreamKey) {
        self.entries
            .write()
            .expect("InMemoryEventLog: entries write lock poisoned")
            .remove(key);
        self.ttls
            .write()
            .expect("InMemoryEventLog: ttls write lock poisoned")
            .remove(key);
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, key: &StreamKey, event: &StreamEvent) -> Result<Cursor, EventLogError> {
        self.check_available()?;

        let cursor = self.next_cursor();
        self.entries
            .write()
            .expect("InMemoryEventLog: entries write lock poisoned")
            .entry(*key)
            .or_default()
            .push(LoggedEvent {
                cursor: cursor.clone(),
                event: event.clone(),
            });

        Ok(cursor)
    }

    async fn range(
        &self,
        key: &StreamKey,
        after: Option<&Cursor>,
    ) -> Result<Vec<LoggedEvent>, EventLogError> {
        self.check_available()?;

        let entries = self
            .entries
            .read()
            .expect("InMemoryEventLog: entries lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_default();

        Ok(match after {
            Some(after) => entries
                .into_iter()
                .filter(|logged| logged.cursor.is_after(after))
                .collect(),
            None => entries,
        })
    }

    async fn expire(&self, key: &StreamKey, ttl: Duration) -> Result<(), EventLogError> {
        self.check_available()?;

        self.ttls
            .write()
            .expect("InMemoryEventLog: ttls write lock poisoned")
            .insert(*key, ttl);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ConversationId, MessageId};
    use crate::domain::streaming::StreamEvent;

    fn test_key() -> StreamKey {
        StreamKey::new(ConversationId::new(), MessageId::new())
    }

    fn token(key: &StreamKey, text: &str) -> StreamEvent {
        StreamEvent::token(key.message_id(), text)
    }

    #[tokio::test]
    async fn append_returns_increasing_cursors() {
        let log = InMemoryEventLog::new();
        let key = test_key();

        let first = log.append(&key, &token(&key, "a")).await.unwrap();
        let second = log.append(&key, &token(&key, "b")).await.unwrap();

        assert!(second.is_after(&first));
        assert_eq!(log.event_count(&key), 2);
    }

    #[tokio::test]
    async fn range_without_cursor_returns_everything() {
        let log = InMemoryEventLog::new();
        let key = test_key();

        log.append(&key, &token(&key, "a")).await.unwrap();
        log.append(&key, &token(&key, "b")).await.unwrap();

        let all = log.range(&key, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn range_is_strictly_after_the_cursor() {
        let log = InMemoryEventLog::new();
        let key = test_key();

        let first = log.append(&key, &token(&key, "a")).await.unwrap();
        log.append(&key, &token(&key, "b")).await.unwrap();
        log.append(&key, &token(&key, "c")).await.unwrap();

        let tail = log.range(&key, Some(&first)).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert!(tail.iter().all(|logged| logged.cursor.is_after(&first)));
    }

    #[tokio::test]
    async fn range_of_unknown_stream_is_empty() {
        let log = InMemoryEventLog::new();
        let all = log.range(&test_key(), None).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn evict_simulates_ttl_expiry() {
        let log = InMemoryEventLog::new();
        let key = test_key();

        log.append(&key, &token(&key, "a")).await.unwrap();
        log.evict(&key);

        let all = log.range(&key, None).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn expire_records_the_ttl() {
        let log = InMemoryEventLog::new();
        let key = test_key();

        log.append(&key, &token(&key, "a")).await.unwrap();
        log.expire(&key, Duration::from_secs(300)).await.unwrap();

        assert_eq!(log.ttl_for(&key), Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn failing_log_rejects_every_operation() {
        let log = InMemoryEventLog::new();
        let key = test_key();
        log.set_failing(true);

        assert!(log.append(&key, &token(&key, "a")).await.is_err());
        assert!(log.range(&key, None).await.is_err());
        assert!(log.expire(&key, Duration::from_secs(1)).await.is_err());

        log.set_failing(false);
        assert!(log.append(&key, &token(&key, "a")).await.is_ok());
    }
}
