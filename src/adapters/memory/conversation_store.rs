//! In-memory conversation store implementation for testing.
//!
//! Holds whole [`Conversation`] aggregates in a map and applies updates
//! through the same domain mutations the Postgres adapter reconstitutes
//! around, so tests observe identical state transitions.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are
//! poisoned. Production code should use the Postgres store adapter.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::domain::conversation::{Conversation, HistoryTurn, Message};
use crate::domain::foundation::{ConversationId, MessageId};
use crate::ports::{ConversationStore, StoreError};

/// In-memory conversation store for testing.
///
/// Features:
/// - Read-after-write consistency per conversation
/// - A failure switch so tests can simulate a down database
/// - Direct aggregate access for assertions
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned. This is acceptable
/// for test code but this adapter should NOT be used in production.
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    failing: AtomicBool,
}

impl InMemoryConversationStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::database("simulated outage"));
        }
        Ok(())
    }

    fn mutate<F>(&self, id: ConversationId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Conversation) -> Result<(), StoreError>,
    {
        self.check_available()?;

        let mut conversations = self
            .conversations
            .write()
            .expect("InMemoryConversationStore: write lock poisoned");
        let conversation = conversations.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply(conversation)?;
        conversation.touch();
        Ok(())
    }

    // === Test Helpers ===

    /// Switches every operation between healthy and failing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the number of stored conversations.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn conversation_count(&self) -> usize {
        self.conversations
            .read()
            .expect("InMemoryConversationStore: lock poisoned")
            .len()
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.check_available()?;

        self.conversations
            .write()
            .expect("InMemoryConversationStore: write lock poisoned")
            .insert(*conversation.id(), conversation.clone());

        Ok(())
    }

    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, StoreError> {
        self.check_available()?;

        Ok(self
            .conversations
            .read()
            .expect("InMemoryConversationStore: lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        message: &Message,
    ) -> Result<(), StoreError> {
        self.mutate(conversation_id, |conversation| {
            conversation.push_message(message.clone());
            Ok(())
        })
    }

    async fn update_message_text(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), StoreError> {
        self.mutate(conversation_id, |conversation| {
            let message = conversation
                .message_mut(&message_id)
                .ok_or(StoreError::MessageNotFound(message_id))?;
            message
                .set_text(text)
                .map_err(|e| StoreError::database(e.message))
        })
    }

    async fn complete_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        self.mutate(conversation_id, |conversation| {
            let message = conversation
                .message_mut(&message_id)
                .ok_or(StoreError::MessageNotFound(message_id))?;
            message
                .complete()
                .map_err(|e| StoreError::database(e.message))
        })
    }

    async fn remove_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        self.mutate(conversation_id, |conversation| {
            conversation
                .remove_message(&message_id)
                .map(|_| ())
                .ok_or(StoreError::MessageNotFound(message_id))
        })
    }

    async fn append_history(
        &self,
        conversation_id: ConversationId,
        turns: &[HistoryTurn],
    ) -> Result<(), StoreError> {
        self.mutate(conversation_id, |conversation| {
            conversation.append_history(turns.to_vec());
            Ok(())
        })
    }

    async fn set_last_city(
        &self,
        conversation_id: ConversationId,
        city: &str,
    ) -> Result<(), StoreError> {
        self.mutate(conversation_id, |conversation| {
            conversation.set_last_city(city);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryConversationStore::new();
        let conversation = Conversation::new(None);
        let id = *conversation.id();

        store.create(&conversation).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.id(), &id);
        assert_eq!(loaded.title(), conversation.title());
    }

    #[tokio::test]
    async fn get_missing_conversation_is_none() {
        let store = InMemoryConversationStore::new();
        assert!(store.get(ConversationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_message_is_visible_on_next_get() {
        let store = InMemoryConversationStore::new();
        let conversation = Conversation::new(None);
        let id = *conversation.id();
        store.create(&conversation).await.unwrap();

        let message = Message::user("what's the weather in Pune?").unwrap();
        store.append_message(id, &message).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.messages().len(), 1);
        assert_eq!(loaded.messages()[0].text(), "what's the weather in Pune?");
    }

    #[tokio::test]
    async fn streaming_message_text_updates_then_completes() {
        let store = InMemoryConversationStore::new();
        let conversation = Conversation::new(None);
        let id = *conversation.id();
        store.create(&conversation).await.unwrap();

        let message = Message::bot_streaming();
        let message_id = *message.id();
        store.append_message(id, &message).await.unwrap();

        store
            .update_message_text(id, message_id, "It's 31")
            .await
            .unwrap();
        store.complete_message(id, message_id).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        let message = loaded.message(&message_id).unwrap();
        assert_eq!(message.text(), "It's 31");
        assert!(!message.is_streaming());
    }

    #[tokio::test]
    async fn remove_message_deletes_it() {
        let store = InMemoryConversationStore::new();
        let conversation = Conversation::new(None);
        let id = *conversation.id();
        store.create(&conversation).await.unwrap();

        let message = Message::bot_streaming();
        let message_id = *message.id();
        store.append_message(id, &message).await.unwrap();
        store.remove_message(id, message_id).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert!(loaded.message(&message_id).is_none());
    }

    #[tokio::test]
    async fn mutations_on_unknown_conversation_are_not_found() {
        let store = InMemoryConversationStore::new();
        let result = store
            .set_last_city(ConversationId::new(), "Pune")
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn history_and_last_city_persist() {
        let store = InMemoryConversationStore::new();
        let conversation = Conversation::new(None);
        let id = *conversation.id();
        store.create(&conversation).await.unwrap();

        store
            .append_history(
                id,
                &[
                    HistoryTurn::human("weather in Pune"),
                    HistoryTurn::ai("It's 31°C and clear."),
                ],
            )
            .await
            .unwrap();
        store.set_last_city(id, "Pune").await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.history().len(), 2);
        assert_eq!(loaded.last_city(), Some("Pune"));
    }

    #[tokio::test]
    async fn failing_store_rejects_every_operation() {
        let store = InMemoryConversationStore::new();
        let conversation = Conversation::new(None);
        let id = *conversation.id();
        store.create(&conversation).await.unwrap();

        store.set_failing(true);
        assert!(store.get(id).await.is_err());
        assert!(store.set_last_city(id, "Pune").await.is_err());

        store.set_failing(false);
        assert!(store.get(id).await.is_ok());
    }
}
