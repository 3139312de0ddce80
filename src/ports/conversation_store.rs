//! Conversation store port - persistence for conversations.
//!
//! The store is the system of record for conversation state. During a
//! streaming reply the store sees periodic partial-text updates; the
//! snapshot it returns is what reconnecting clients sync against.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::conversation::{Conversation, HistoryTurn, Message};
use crate::domain::foundation::{ConversationId, MessageId};

/// Persistent storage for conversations, their messages, and the
/// model-facing history.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persists a new conversation.
    async fn create(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Loads a conversation with its messages and history.
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, StoreError>;

    /// Appends a message to a conversation.
    async fn append_message(
        &self,
        conversation_id: ConversationId,
        message: &Message,
    ) -> Result<(), StoreError>;

    /// Replaces the accumulated text of a streaming message.
    async fn update_message_text(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), StoreError>;

    /// Clears the streaming flag on a message.
    async fn complete_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), StoreError>;

    /// Deletes a message, used when a reply fails partway.
    async fn remove_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), StoreError>;

    /// Appends turns to the model-facing history.
    async fn append_history(
        &self,
        conversation_id: ConversationId,
        turns: &[HistoryTurn],
    ) -> Result<(), StoreError>;

    /// Records the last city the user asked about.
    async fn set_last_city(
        &self,
        conversation_id: ConversationId,
        city: &str,
    ) -> Result<(), StoreError>;
}

/// Errors from the conversation store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Conversation does not exist.
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),

    /// Message does not exist within the conversation.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Creates a database error.
    pub fn database(message: impl Into<String>) -> Self {
        StoreError::Database(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_with_context() {
        let id = ConversationId::new();
        let err = StoreError::NotFound(id);
        assert_eq!(err.to_string(), format!("conversation not found: {}", id));

        let err = StoreError::database("pool exhausted");
        assert_eq!(err.to_string(), "database error: pool exhausted");
    }
}
