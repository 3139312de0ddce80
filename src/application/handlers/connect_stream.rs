//! Reconnection protocol for new push subscribers.
//!
//! Subscribing happens FIRST, before any historical state is computed,
//! so no event broadcast concurrently with connection setup can fall
//! into a gap. The price is an occasional duplicate: a token that is
//! both inside the sync snapshot and delivered live. Clients resolve
//! that with the cursor carried by the `resume` event, dropping any
//! later `token` frame at or below it.

use std::sync::Arc;

use thiserror::Error;

use crate::adapters::sse::{BroadcastHub, PushFrame, Subscription};
use crate::application::stream_registry::{StreamSessionRegistry, StreamStatus};
use crate::domain::foundation::ConversationId;
use crate::domain::streaming::{Cursor, MessageSnapshot, StreamEvent, StreamKey};
use crate::ports::{ConversationStore, StoreError};

/// Errors surfaced to the connecting request.
#[derive(Debug, Error)]
pub enum ConnectStreamError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("conversation store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for ConnectStreamError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => ConnectStreamError::ConversationNotFound(id),
            other => ConnectStreamError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Wires a new push connection into a conversation's stream.
pub struct ConnectStreamHandler {
    store: Arc<dyn ConversationStore>,
    registry: Arc<StreamSessionRegistry>,
    hub: Arc<BroadcastHub>,
}

impl ConnectStreamHandler {
    /// Creates a handler over the given collaborators.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        registry: Arc<StreamSessionRegistry>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            store,
            registry,
            hub,
        }
    }

    /// Handles one new connection, fresh or resuming.
    ///
    /// Returns the live subscription whose receiver feeds the SSE body.
    /// The opening frames (connected, or sync + resume) are already
    /// queued on it, ahead of any live frame that arrives later.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` for an unknown conversation; the
    ///   just-created subscription is rolled back
    /// - `StoreUnavailable` when the authoritative read fails
    pub async fn handle(
        &self,
        conversation_id: ConversationId,
        resume_cursor: Option<Cursor>,
    ) -> Result<Subscription, ConnectStreamError> {
        // Subscribe before reading any state, so events emitted while
        // we read are queued rather than lost.
        let subscription = self.hub.subscribe(&conversation_id).await;

        let result = self
            .replay_history(conversation_id, &subscription, resume_cursor)
            .await;

        if let Err(error) = result {
            self.hub
                .unsubscribe(&conversation_id, &subscription.subscriber_id)
                .await;
            return Err(error);
        }

        Ok(subscription)
    }

    /// Queues the opening frames on an already-registered subscriber.
    async fn replay_history(
        &self,
        conversation_id: ConversationId,
        subscription: &Subscription,
        resume_cursor: Option<Cursor>,
    ) -> Result<(), ConnectStreamError> {
        // The store is authoritative even for a fresh viewer: an
        // unknown conversation must 404 rather than stream silence.
        let conversation = self
            .store
            .get(conversation_id)
            .await?
            .ok_or(ConnectStreamError::ConversationNotFound(conversation_id))?;

        let Some(client_cursor) = resume_cursor else {
            // Brand-new viewer: no replay is owed, just an identity.
            self.hub
                .send_to(
                    &conversation_id,
                    &subscription.subscriber_id,
                    PushFrame::event(StreamEvent::Connected {
                        client_id: subscription.subscriber_id,
                    }),
                )
                .await;
            tracing::debug!(%conversation_id, subscriber_id = %subscription.subscriber_id, "Fresh subscriber connected");
            return Ok(());
        };

        // Resuming viewer: full-state sync from the store is the
        // correctness backstop; the log only holds recent events.
        let snapshots: Vec<MessageSnapshot> =
            conversation.messages().iter().map(MessageSnapshot::from).collect();
        self.hub
            .send_to(
                &conversation_id,
                &subscription.subscriber_id,
                PushFrame::event(StreamEvent::message_sync(snapshots)),
            )
            .await;

        // Any message still streaming gets its accumulated text so the
        // client appends future tokens instead of replacing its buffer.
        for message in conversation.streaming_messages() {
            let key = StreamKey::new(conversation_id, *message.id());
            let state = self.registry.resume(&key).await;
            if state.found && state.status == StreamStatus::Active {
                self.hub
                    .send_to(
                        &conversation_id,
                        &subscription.subscriber_id,
                        PushFrame::event(StreamEvent::Resume {
                            message_id: *message.id(),
                            text: state.text,
                            cursor: state.cursor,
                        }),
                    )
                    .await;
            }
        }

        tracing::debug!(
            %conversation_id,
            subscriber_id = %subscription.subscriber_id,
            from_cursor = %client_cursor,
            "Subscriber resumed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ConnectStreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectStreamHandler").finish_non_exhaustive()
    }
}
