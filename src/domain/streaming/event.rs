//! Stream events pushed to SSE subscribers.
//!
//! Every frame a client sees is one of these, tagged with a `type`
//! field. `token` and `done` are also what the durable log records,
//! so a replayed stream deserializes to the same types.

use crate::domain::conversation::{Message, Role};
use crate::domain::foundation::{MessageId, SubscriberId, Timestamp};
use serde::{Deserialize, Serialize};

use super::cursor::Cursor;

/// Snapshot of a message as sent inside `message` sync events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub streaming: bool,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageSnapshot {
    fn from(message: &Message) -> Self {
        Self {
            id: *message.id(),
            role: message.role(),
            text: message.text().to_string(),
            streaming: message.is_streaming(),
            created_at: *message.created_at(),
        }
    }
}

/// An event on a conversation's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// First frame on a fresh connection (no cursor supplied).
    Connected { client_id: SubscriberId },

    /// Full message sync, sent when a client reconnects with a cursor.
    Message { messages: Vec<MessageSnapshot> },

    /// Generation progress notice ("processing", "generating", ...).
    Status { label: String },

    /// One token fragment of a streaming bot reply.
    Token { message_id: MessageId, text: String },

    /// Catch-up text for a reply that was mid-stream when the client
    /// reconnected. `cursor` is the log position the text covers, so
    /// the client can drop any duplicated `token` frames.
    Resume {
        message_id: MessageId,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cursor: Option<Cursor>,
    },

    /// A bot reply finished streaming.
    Done { message_id: MessageId },
}

impl StreamEvent {
    /// Returns the wire name of this event, matching the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Message { .. } => "message",
            StreamEvent::Status { .. } => "status",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Resume { .. } => "resume",
            StreamEvent::Done { .. } => "done",
        }
    }

    /// Builds a status event.
    pub fn status(label: impl Into<String>) -> Self {
        StreamEvent::Status {
            label: label.into(),
        }
    }

    /// Builds a token event.
    pub fn token(message_id: MessageId, text: impl Into<String>) -> Self {
        StreamEvent::Token {
            message_id,
            text: text.into(),
        }
    }

    /// Builds a sync event from message snapshots.
    pub fn message_sync(messages: Vec<MessageSnapshot>) -> Self {
        StreamEvent::Message { messages }
    }

    /// True for the event kinds the durable log records.
    pub fn is_replayable(&self) -> bool {
        matches!(self, StreamEvent::Token { .. } | StreamEvent::Done { .. })
    }
}
