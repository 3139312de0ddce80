//! Registry of in-flight streaming replies.
//!
//! One session exists per bot reply being generated, keyed by
//! [`StreamKey`]. The session accumulates the reply text in memory and
//! mirrors every fragment into the durable event log, so a reply can be
//! resumed from memory while it streams and replayed from the log after
//! the session is gone.
//!
//! The log is written first on every append: a fragment that never
//! reached the log has no cursor, and subscribers receive it as a
//! live-only frame. A log outage therefore degrades resumability, never
//! delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::domain::foundation::{ConversationId, MessageId};
use crate::domain::streaming::{Cursor, StreamEvent, StreamKey};
use crate::ports::EventLog;

/// One reply being streamed right now.
#[derive(Debug)]
struct StreamSession {
    /// Accumulated reply text, in append order.
    text: String,
    /// Cursor of the last fragment the log accepted.
    last_cursor: Option<Cursor>,
    /// When the last fragment arrived, for idle sweeping.
    last_append: Instant,
}

impl StreamSession {
    fn new() -> Self {
        Self {
            text: String::new(),
            last_cursor: None,
            last_append: Instant::now(),
        }
    }
}

/// Result of appending one fragment to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    /// Accumulated reply text including this fragment.
    pub text: String,
    /// Log position of the fragment, absent when the log is down.
    pub cursor: Option<Cursor>,
}

/// Whether a resumed reply is still streaming or already finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Tokens may still arrive.
    Active,
    /// The reply finished; the text is final.
    Completed,
}

/// What a resume lookup found for a stream key.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeState {
    /// False when neither memory nor the log knows the key.
    pub found: bool,
    /// Stream status, meaningful only when `found`.
    pub status: StreamStatus,
    /// Accumulated reply text so far.
    pub text: String,
    /// Cursor of the last fragment covered by `text`, if the log
    /// recorded any.
    pub cursor: Option<Cursor>,
}

impl ResumeState {
    fn not_found() -> Self {
        Self {
            found: false,
            status: StreamStatus::Active,
            text: String::new(),
            cursor: None,
        }
    }
}

/// Errors from the stream session registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// No active session exists for the key. Appends hitting this mean
    /// the session was swept or never created; the reply cannot
    /// continue as a resumable stream.
    #[error("no active stream session for {0}")]
    SessionNotFound(StreamKey),
}

/// Tracks active streaming replies and their durable log mirror.
///
/// # Thread Safety
///
/// Sessions live under a `tokio::sync::RwLock`; log writes happen
/// outside the lock so a slow log never blocks resume lookups.
pub struct StreamSessionRegistry {
    sessions: RwLock<HashMap<StreamKey, StreamSession>>,
    log: Arc<dyn EventLog>,
    /// TTL applied to a reply's log once it completes or is discarded.
    done_ttl: Duration,
}

impl StreamSessionRegistry {
    /// Creates a registry backed by the given event log.
    pub fn new(log: Arc<dyn EventLog>, done_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            log,
            done_ttl,
        }
    }

    /// Opens a session for a new bot reply.
    pub async fn create_session(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> StreamKey {
        let key = StreamKey::new(conversation_id, message_id);
        self.sessions
            .write()
            .await
            .insert(key, StreamSession::new());
        key
    }

    /// Appends one fragment: log first, then memory.
    ///
    /// A log failure is logged and costs only the cursor. An unknown
    /// key is an error; the fragment has nowhere to accumulate.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if no session is open for the key
    pub async fn append(
        &self,
        key: &StreamKey,
        fragment: &str,
    ) -> Result<AppendOutcome, RegistryError> {
        let event = StreamEvent::token(key.message_id(), fragment);
        let cursor = match self.log.append(key, &event).await {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::warn!(stream = %key, "Event log append failed, streaming live-only: {}", e);
                None
            }
        };

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(key)
            .ok_or(RegistryError::SessionNotFound(*key))?;

        session.text.push_str(fragment);
        if cursor.is_some() {
            session.last_cursor = cursor.clone();
        }
        session.last_append = Instant::now();

        Ok(AppendOutcome {
            text: session.text.clone(),
            cursor,
        })
    }

    /// Closes a session after its reply finished, returning the full
    /// text.
    ///
    /// Writes the completion marker to the log and tightens the log TTL
    /// so finished replies expire quickly. Both log writes are
    /// best-effort.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if no session is open for the key
    pub async fn complete(&self, key: &StreamKey) -> Result<String, RegistryError> {
        let done = StreamEvent::Done {
            message_id: key.message_id(),
        };
        if let Err(e) = self.log.append(key, &done).await {
            tracing::warn!(stream = %key, "Completion marker append failed: {}", e);
        }
        if let Err(e) = self.log.expire(key, self.done_ttl).await {
            tracing::warn!(stream = %key, "Log TTL tighten failed: {}", e);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .remove(key)
            .ok_or(RegistryError::SessionNotFound(*key))?;
        Ok(session.text)
    }

    /// Drops a session whose reply failed.
    ///
    /// Removing an unknown key is a no-op. The log is put on the short
    /// TTL; a failed reply's fragments are not worth keeping around.
    pub async fn discard(&self, key: &StreamKey) {
        self.sessions.write().await.remove(key);
        if let Err(e) = self.log.expire(key, self.done_ttl).await {
            tracing::warn!(stream = %key, "Log TTL tighten failed: {}", e);
        }
    }

    /// Looks up the accumulated state of a reply.
    ///
    /// Memory is checked first; a missing session falls back to a full
    /// log replay. The replayed text is the in-order concatenation of
    /// the log's token fragments, and the status is `Completed` exactly
    /// when the completion marker is present.
    pub async fn resume(&self, key: &StreamKey) -> ResumeState {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(key) {
                return ResumeState {
                    found: true,
                    status: StreamStatus::Active,
                    text: session.text.clone(),
                    cursor: session.last_cursor.clone(),
                };
            }
        }

        let entries = match self.log.range(key, None).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(stream = %key, "Event log replay failed: {}", e);
                return ResumeState::not_found();
            }
        };

        if entries.is_empty() {
            return ResumeState::not_found();
        }

        let mut text = String::new();
        let mut cursor = None;
        let mut status = StreamStatus::Active;
        for entry in entries {
            match entry.event {
                StreamEvent::Token { text: fragment, .. } => {
                    text.push_str(&fragment);
                    cursor = Some(entry.cursor);
                }
                StreamEvent::Done { .. } => status = StreamStatus::Completed,
                _ => {}
            }
        }

        ResumeState {
            found: true,
            status,
            text,
            cursor,
        }
    }

    /// Removes sessions with no append for `idle_after`, returning how
    /// many were swept.
    ///
    /// Sweeping never touches the log, so a swept reply stays
    /// resumable by replay until its TTL runs out.
    pub async fn sweep_idle(&self, idle_after: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_append.elapsed() < idle_after);
        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, "Swept idle stream sessions");
        }
        swept
    }

    /// Number of sessions currently open.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Spawns a background task that sweeps idle sessions on an
    /// interval.
    pub fn spawn_idle_sweep(
        registry: Arc<Self>,
        every: Duration,
        idle_after: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                registry.sweep_idle(idle_after).await;
            }
        })
    }
}

impl std::fmt::Debug for StreamSessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSessionRegistry")
            .field("done_ttl", &self.done_ttl)
            .finish_non_exhaustive()
    }
}
