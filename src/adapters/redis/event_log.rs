//! Redis-backed event log implementation for production deployments.
//!
//! Each bot reply gets its own Redis stream. XADD assigns the entry IDs
//! that clients later echo as resume cursors, and XRANGE with an
//! exclusive lower bound serves the strictly-after replay reads.
//! Suitable for multi-server deployments.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::StreamRangeReply;
use redis::AsyncCommands;
use std::time::Duration;

use crate::domain::streaming::{Cursor, StreamEvent, StreamKey};
use crate::ports::{EventLog, EventLogError, LoggedEvent};

/// Redis stream key prefix for reply event logs.
const KEY_PREFIX: &str = "stream";

/// Redis-backed event log for production multi-server deployments.
///
/// Uses one Redis stream per reply:
/// 1. XADD with a `*` ID appends and mints the cursor
/// 2. EXPIRE after every append keeps an active stream alive
/// 3. XRANGE `(cursor` .. `+` reads strictly after a resume cursor
///
/// A stream whose TTL has fired reads back as empty, which callers treat
/// as "nothing to replay" rather than an error.
#[derive(Clone)]
pub struct RedisEventLog {
    conn: ConnectionManager,
    idle_ttl: Duration,
}

impl RedisEventLog {
    /// Create a new Redis event log.
    ///
    /// `idle_ttl` is re-applied on every append so a stream only expires
    /// once writes stop.
    pub fn new(conn: ConnectionManager, idle_ttl: Duration) -> Self {
        Self { conn, idle_ttl }
    }

    fn redis_key(key: &StreamKey) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl EventLog for RedisEventLog {
    async fn append(&self, key: &StreamKey, event: &StreamEvent) -> Result<Cursor, EventLogError> {
        let redis_key = Self::redis_key(key);
        let payload = serde_json::to_string(event)
            .map_err(|e| EventLogError::serialization(e.to_string()))?;

        let mut conn = self.conn.clone();

        let entry_id: String = conn
            .xadd(&redis_key, "*", &[("event", payload.as_str())])
            .await
            .map_err(|e: redis::RedisError| EventLogError::Unavailable(e.to_string()))?;

        // Refresh the idle TTL so only abandoned streams expire
        conn.expire::<_, ()>(&redis_key, self.idle_ttl.as_secs() as i64)
            .await
            .map_err(|e: redis::RedisError| EventLogError::Unavailable(e.to_string()))?;

        Ok(Cursor::new(entry_id))
    }

    async fn range(
        &self,
        key: &StreamKey,
        after: Option<&Cursor>,
    ) -> Result<Vec<LoggedEvent>, EventLogError> {
        let redis_key = Self::redis_key(key);

        // "(" makes the lower bound exclusive; "-" reads from the start
        let start = match after {
            Some(cursor) => format!("({}", cursor),
            None => "-".to_string(),
        };

        let mut conn = self.conn.clone();

        let reply: StreamRangeReply = conn
            .xrange(&redis_key, start.as_str(), "+")
            .await
            .map_err(|e: redis::RedisError| EventLogError::Unavailable(e.to_string()))?;

        let mut events = Vec::with_capacity(reply.ids.len());
        for entry in reply.ids {
            let payload: String = entry.get("event").ok_or_else(|| {
                EventLogError::serialization(format!("entry {} missing event field", entry.id))
            })?;
            let event: StreamEvent = serde_json::from_str(&payload)
                .map_err(|e| EventLogError::serialization(e.to_string()))?;
            events.push(LoggedEvent {
                cursor: Cursor::new(entry.id),
                event,
            });
        }

        Ok(events)
    }

    async fn expire(&self, key: &StreamKey, ttl: Duration) -> Result<(), EventLogError> {
        let redis_key = Self::redis_key(key);
        let mut conn = self.conn.clone();

        conn.expire::<_, ()>(&redis_key, ttl.as_secs() as i64)
            .await
            .map_err(|e: redis::RedisError| EventLogError::Unavailable(e.to_string()))?;

        Ok(())
    }
}

impl std::fmt::Debug for RedisEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventLog")
            .field("idle_ttl", &self.idle_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    // Note: Redis integration tests require a running Redis instance
    // and are typically run separately from unit tests.
    //
    // Example test setup:
    //
    // #[tokio::test]
    // #[ignore] // Run with: cargo test -- --ignored
    // async fn test_redis_event_log() {
    //     let client = redis::Client::open("redis://127.0.0.1/").unwrap();
    //     let conn = redis::aio::ConnectionManager::new(client).await.unwrap();
    //     let log = RedisEventLog::new(conn, Duration::from_secs(3600));
    //     // ... append, range, expire against the live stream
    // }
}
