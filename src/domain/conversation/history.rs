//! Model context history for a conversation.
//!
//! History turns are the condensed transcript handed to the chat model
//! on each request. They are append-only and separate from the display
//! messages, which carry streaming state and timestamps.

use serde::{Deserialize, Serialize};

/// Who produced a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The person chatting.
    Human,
    /// The weather assistant.
    Ai,
}

/// One turn of the model-facing transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub text: String,
}

impl HistoryTurn {
    /// Creates a human turn.
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Human,
            text: text.into(),
        }
    }

    /// Creates an assistant turn.
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Ai,
            text: text.into(),
        }
    }
}
