//! Message entity for conversations.
//!
//! A message is either user input (complete at creation) or a bot reply,
//! which starts empty in the streaming state and accumulates text as the
//! model produces tokens.

use crate::domain::foundation::{DomainError, ErrorCode, MessageId, Timestamp};
use serde::{Deserialize, Serialize};

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A person typing into the chat.
    User,
    /// The weather assistant.
    Bot,
}

/// A message within a conversation.
///
/// # Invariants
///
/// - `id` is globally unique
/// - user messages are never in the streaming state
/// - once `complete` has been called, `streaming` stays false
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    id: MessageId,

    /// The role of the message sender.
    role: Role,

    /// The text of the message. Grows while a bot reply streams.
    text: String,

    /// True while tokens are still being appended.
    streaming: bool,

    /// When the message was created.
    created_at: Timestamp,
}

impl Message {
    /// Creates a user message.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if text is empty
    pub fn user(text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::validation(
                "text",
                "Message text cannot be empty",
            ));
        }

        Ok(Self {
            id: MessageId::new(),
            role: Role::User,
            text,
            streaming: false,
            created_at: Timestamp::now(),
        })
    }

    /// Creates an empty bot message in the streaming state.
    pub fn bot_streaming() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Bot,
            text: String::new(),
            streaming: true,
            created_at: Timestamp::now(),
        }
    }

    /// Creates a completed bot message with the given text.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Bot,
            text: text.into(),
            streaming: false,
            created_at: Timestamp::now(),
        }
    }

    /// Reconstitutes a message from persistence (no validation).
    pub fn reconstitute(
        id: MessageId,
        role: Role,
        text: String,
        streaming: bool,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            role,
            text,
            streaming,
            created_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the message ID.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true while tokens are still being appended.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Returns when the message was created.
    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Returns true if this message is from the user.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Returns true if this message is from the bot.
    pub fn is_bot(&self) -> bool {
        self.role == Role::Bot
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a token fragment to a streaming message.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the message is not streaming
    pub fn push_text(&mut self, fragment: &str) -> Result<(), DomainError> {
        if !self.streaming {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Message {} is not streaming", self.id),
            ));
        }
        self.text.push_str(fragment);
        Ok(())
    }

    /// Replaces the full text of a streaming message.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the message is not streaming
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), DomainError> {
        if !self.streaming {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Message {} is not streaming", self.id),
            ));
        }
        self.text = text.into();
        Ok(())
    }

    /// Marks a streaming message as complete.
    ///
    /// # Errors
    ///
    /// - `MessageAlreadyCompleted` if the message is not streaming
    pub fn complete(&mut self) -> Result<(), DomainError> {
        if !self.streaming {
            return Err(DomainError::new(
                ErrorCode::MessageAlreadyCompleted,
                format!("Message {} is already completed", self.id),
            ));
        }
        self.streaming = false;
        Ok(())
    }
}
