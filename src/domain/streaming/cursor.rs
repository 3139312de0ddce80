//! Cursor and stream key value objects.
//!
//! A cursor names a position in the durable token log for one bot reply.
//! Cursors are minted by the log (Redis stream entry IDs of the form
//! `millis-seq`) and treated as opaque by clients, who echo the last one
//! they saw when reconnecting.

use crate::domain::foundation::{ConversationId, MessageId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an event in the token log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a log entry ID as minted by the log store.
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self(entry_id.into())
    }

    /// Parses a client-supplied cursor, validating the `millis-seq` shape.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` if the value is not two dash-separated integers
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let cursor = Self(value.to_string());
        if cursor.numeric().is_none() {
            return Err(ValidationError::invalid_format(
                "cursor",
                "expected <millis>-<seq>",
            ));
        }
        Ok(cursor)
    }

    /// Returns the raw entry ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the cursor into its (millis, seq) pair, if well formed.
    pub fn numeric(&self) -> Option<(u64, u64)> {
        let (millis, seq) = self.0.split_once('-')?;
        Some((millis.parse().ok()?, seq.parse().ok()?))
    }

    /// Compares log positions. Falls back to byte order for cursors
    /// that do not carry the `millis-seq` shape.
    pub fn is_after(&self, other: &Cursor) -> bool {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a > b,
            _ => self.0 > other.0,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the token log of a single bot reply.
///
/// One stream exists per `(conversation, message)` pair, so concurrent
/// replies in the same conversation never interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    conversation_id: ConversationId,
    message_id: MessageId,
}

impl StreamKey {
    /// Creates a stream key for one bot reply.
    pub fn new(conversation_id: ConversationId, message_id: MessageId) -> Self {
        Self {
            conversation_id,
            message_id,
        }
    }

    /// Returns the conversation this reply belongs to.
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Returns the reply message.
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.conversation_id, self.message_id)
    }
}
