//! User message intake.
//!
//! Validates and durably records a user message, announces it to live
//! subscribers, and spawns the reply orchestrator in the background.
//! The triggering HTTP request returns as soon as the user message is
//! safe; generation progress travels only through the push channel.

use std::sync::Arc;

use thiserror::Error;

use crate::adapters::sse::{BroadcastHub, PushFrame};
use crate::domain::conversation::Message;
use crate::domain::foundation::ConversationId;
use crate::domain::streaming::{MessageSnapshot, StreamEvent};
use crate::ports::{ConversationStore, StoreError};

use super::generate_reply::ReplyOrchestrator;

/// Longest accepted user message, in characters.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Command to submit a user message to a conversation.
#[derive(Debug, Clone)]
pub struct SubmitMessageCommand {
    pub conversation_id: ConversationId,
    pub text: String,
}

/// Errors surfaced to the submitting request.
#[derive(Debug, Error)]
pub enum SubmitMessageError {
    #[error("message text cannot be empty")]
    EmptyMessage,

    #[error("message text exceeds {max} characters (got {actual})")]
    MessageTooLong { max: usize, actual: usize },

    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("conversation store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmitMessageResult {
    /// The persisted user message.
    pub message: Message,
}

/// Accepts user messages and kicks off reply generation.
pub struct SubmitMessageHandler {
    store: Arc<dyn ConversationStore>,
    hub: Arc<BroadcastHub>,
    orchestrator: Arc<ReplyOrchestrator>,
}

impl SubmitMessageHandler {
    /// Creates a handler over the given collaborators.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        hub: Arc<BroadcastHub>,
        orchestrator: Arc<ReplyOrchestrator>,
    ) -> Self {
        Self {
            store,
            hub,
            orchestrator,
        }
    }

    /// Handles one submission.
    ///
    /// # Errors
    ///
    /// - `EmptyMessage` / `MessageTooLong` on invalid input, before any
    ///   storage or background work
    /// - `ConversationNotFound` for an unknown conversation
    /// - `StoreUnavailable` when the durable store rejects the write;
    ///   no orchestrator run is started in that case
    pub async fn handle(
        &self,
        command: SubmitMessageCommand,
    ) -> Result<SubmitMessageResult, SubmitMessageError> {
        // 1. Validate before touching any collaborator.
        let text = command.text.trim().to_string();
        if text.is_empty() {
            return Err(SubmitMessageError::EmptyMessage);
        }
        let chars = text.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(SubmitMessageError::MessageTooLong {
                max: MAX_MESSAGE_CHARS,
                actual: chars,
            });
        }

        // 2. The conversation must exist; a missing store is the
        //    caller's problem, not the background run's.
        self.store
            .get(command.conversation_id)
            .await
            .map_err(|e| SubmitMessageError::StoreUnavailable(e.to_string()))?
            .ok_or(SubmitMessageError::ConversationNotFound(
                command.conversation_id,
            ))?;

        // 3. Durably record the user message.
        let message = Message::user(&text).map_err(|_| SubmitMessageError::EmptyMessage)?;
        self.store
            .append_message(command.conversation_id, &message)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(id) => SubmitMessageError::ConversationNotFound(id),
                other => SubmitMessageError::StoreUnavailable(other.to_string()),
            })?;

        // 4. Announce it to everyone already watching.
        self.hub
            .broadcast(
                &command.conversation_id,
                PushFrame::event(StreamEvent::message_sync(vec![MessageSnapshot::from(
                    &message,
                )])),
            )
            .await;

        // 5. Generate the reply in the background; the request is done.
        let orchestrator = Arc::clone(&self.orchestrator);
        let conversation_id = command.conversation_id;
        tokio::spawn(async move {
            orchestrator.run(conversation_id, text).await;
        });

        tracing::info!(%conversation_id, message_id = %message.id(), "User message accepted");
        Ok(SubmitMessageResult { message })
    }
}

impl std::fmt::Debug for SubmitMessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitMessageHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockChatModel;
    use crate::adapters::memory::{InMemoryConversationStore, InMemoryEventLog};
    use crate::application::handlers::generate_reply::OrchestratorConfig;
    use crate::application::stream_registry::StreamSessionRegistry;
    use crate::domain::conversation::Conversation;
    use crate::ports::{EventLog, ForecastKind, WeatherError, WeatherReport, WeatherService};
    use async_trait::async_trait;
    use std::time::Duration;

    struct SilentWeather;

    #[async_trait]
    impl WeatherService for SilentWeather {
        async fn summary(&self, _city: &str, _kind: ForecastKind) -> String {
            "n/a".to_string()
        }

        async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
            Err(WeatherError::city_not_found(city))
        }
    }

    fn handler(store: Arc<InMemoryConversationStore>, hub: Arc<BroadcastHub>) -> SubmitMessageHandler {
        let log = Arc::new(InMemoryEventLog::new());
        let registry = Arc::new(StreamSessionRegistry::new(
            log as Arc<dyn EventLog>,
            Duration::from_secs(300),
        ));
        let orchestrator = Arc::new(ReplyOrchestrator::new(
            store.clone(),
            Arc::new(MockChatModel::new().with_reply("Sunny.")),
            Arc::new(SilentWeather),
            registry,
            hub.clone(),
            OrchestratorConfig::default(),
        ));
        SubmitMessageHandler::new(store, hub, orchestrator)
    }

    async fn seeded_store() -> (Arc<InMemoryConversationStore>, ConversationId) {
        let store = Arc::new(InMemoryConversationStore::new());
        let conversation = Conversation::new(None);
        let id = *conversation.id();
        store.create(&conversation).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn valid_message_is_persisted_and_announced() {
        let (store, conversation_id) = seeded_store().await;
        let hub = Arc::new(BroadcastHub::with_default_capacity());
        let mut subscription = hub.subscribe(&conversation_id).await;
        let handler = handler(store.clone(), hub);

        let result = handler
            .handle(SubmitMessageCommand {
                conversation_id,
                text: "  weather in Pune  ".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.message.text(), "weather in Pune");
        let frame = subscription.receiver.recv().await.unwrap();
        assert!(matches!(
            frame,
            PushFrame::Event {
                event: StreamEvent::Message { .. },
                ..
            }
        ));

        let stored = store.get(conversation_id).await.unwrap().unwrap();
        assert!(stored.messages().iter().any(|m| m.is_user()));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_synchronously() {
        let (store, conversation_id) = seeded_store().await;
        let hub = Arc::new(BroadcastHub::with_default_capacity());
        let handler = handler(store.clone(), hub);

        let result = handler
            .handle(SubmitMessageCommand {
                conversation_id,
                text: "   ".to_string(),
            })
            .await;

        assert!(matches!(result, Err(SubmitMessageError::EmptyMessage)));
        let stored = store.get(conversation_id).await.unwrap().unwrap();
        assert!(stored.messages().is_empty());
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let (store, conversation_id) = seeded_store().await;
        let hub = Arc::new(BroadcastHub::with_default_capacity());
        let handler = handler(store, hub);

        let result = handler
            .handle(SubmitMessageCommand {
                conversation_id,
                text: "x".repeat(4001),
            })
            .await;

        assert!(matches!(
            result,
            Err(SubmitMessageError::MessageTooLong { max: 4000, .. })
        ));
    }

    #[tokio::test]
    async fn unknown_conversation_is_rejected() {
        let store = Arc::new(InMemoryConversationStore::new());
        let hub = Arc::new(BroadcastHub::with_default_capacity());
        let handler = handler(store, hub);

        let result = handler
            .handle(SubmitMessageCommand {
                conversation_id: ConversationId::new(),
                text: "hello".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(SubmitMessageError::ConversationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn store_outage_is_surfaced_before_any_background_work() {
        let (store, conversation_id) = seeded_store().await;
        store.set_failing(true);
        let hub = Arc::new(BroadcastHub::with_default_capacity());
        let handler = handler(store, hub);

        let result = handler
            .handle(SubmitMessageCommand {
                conversation_id,
                text: "hello".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(SubmitMessageError::StoreUnavailable(_))
        ));
    }
}
