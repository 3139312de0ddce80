//! Subscriber hub for conversation-scoped frame fan-out.
//!
//! Rooms are organized by conversation ID, so frames for one
//! conversation's reply reach every client watching that conversation
//! and nobody else.
//!
//! # Architecture
//!
//! ```text
//! Room: conversation-123    Room: conversation-456
//! ├── subscriber-a          ├── subscriber-d
//! ├── subscriber-b          └── subscriber-e
//! └── subscriber-c
//! ```
//!
//! When a reply streams in conversation-123, only subscribers a, b, c
//! receive its frames. Each subscriber holds its own bounded channel
//! rather than sharing a broadcast channel: reconnect sync frames must
//! target a single subscriber, and a consumer that stops draining its
//! channel is evicted without affecting the rest of the room.
//!
//! # Thread Safety
//!
//! Uses `RwLock` for the room registry since broadcasts (reads) vastly
//! outnumber subscribes and evictions (writes). Concurrent broadcasts
//! to different rooms proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::domain::foundation::{ConversationId, SubscriberId};

use super::frames::PushFrame;

/// An active subscription to one conversation's stream.
///
/// Dropping the receiver does not remove the hub entry; the
/// subscriber is evicted on the next delivery attempt or via
/// [`BroadcastHub::unsubscribe`] (usually through a [`SubscriberGuard`]).
pub struct Subscription {
    /// Hub-assigned identity of this subscriber.
    pub subscriber_id: SubscriberId,
    /// Channel the hub pushes frames into.
    pub receiver: mpsc::Receiver<PushFrame>,
}

/// Manages per-conversation subscriber rooms.
///
/// Provides:
/// - Subscribe/unsubscribe operations
/// - Broadcast to all subscribers of a conversation
/// - Targeted delivery to a single subscriber
/// - Eviction of closed or saturated subscribers
/// - Automatic cleanup of empty rooms
pub struct BroadcastHub {
    /// Map of conversation_id → subscriber_id → frame sender.
    rooms: RwLock<HashMap<ConversationId, HashMap<SubscriberId, mpsc::Sender<PushFrame>>>>,

    /// Buffer size for each subscriber's channel.
    channel_capacity: usize,
}

impl BroadcastHub {
    /// Create a new hub with the given per-subscriber buffer size.
    ///
    /// # Arguments
    ///
    /// * `channel_capacity` - Frames buffered per subscriber before a
    ///   slow consumer is evicted. Larger values ride out consumer
    ///   stalls longer at the cost of memory per connection.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    /// Create with default capacity (64 frames).
    pub fn with_default_capacity() -> Self {
        Self::new(64)
    }

    /// Add a subscriber to a conversation's room.
    ///
    /// If the room doesn't exist, it's created automatically.
    ///
    /// # Returns
    ///
    /// A [`Subscription`] holding the new subscriber's identity and
    /// the receiving end of its frame channel.
    pub async fn subscribe(&self, conversation_id: &ConversationId) -> Subscription {
        let subscriber_id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(*conversation_id)
            .or_default()
            .insert(subscriber_id, tx);

        Subscription {
            subscriber_id,
            receiver: rx,
        }
    }

    /// Remove a subscriber from a conversation's room.
    ///
    /// If the room becomes empty, it's cleaned up. Removing an unknown
    /// subscriber is a no-op, so disconnect paths can call this without
    /// checking whether an eviction already happened.
    pub async fn unsubscribe(&self, conversation_id: &ConversationId, subscriber_id: &SubscriberId) {
        let mut rooms = self.rooms.write().await;

        if let Some(room) = rooms.get_mut(conversation_id) {
            room.remove(subscriber_id);
            if room.is_empty() {
                rooms.remove(conversation_id);
            }
        }
    }

    /// Broadcast a frame to all subscribers of a conversation.
    ///
    /// If no subscribers are in the room, this is a no-op. Subscribers
    /// whose channel is closed or full are evicted; their connection
    /// task observes the closed channel and ends the SSE response, and
    /// the client reconnects with its last cursor.
    pub async fn broadcast(&self, conversation_id: &ConversationId, frame: PushFrame) {
        let mut evicted = Vec::new();

        {
            let rooms = self.rooms.read().await;
            let Some(room) = rooms.get(conversation_id) else {
                return;
            };

            for (subscriber_id, sender) in room {
                if sender.try_send(frame.clone()).is_err() {
                    evicted.push(*subscriber_id);
                }
            }
        }

        if !evicted.is_empty() {
            self.evict(conversation_id, &evicted).await;
        }
    }

    /// Deliver a frame to one subscriber of a conversation.
    ///
    /// Used for per-connection frames like reconnect sync and resume,
    /// which must not reach the rest of the room.
    ///
    /// # Returns
    ///
    /// `true` if the frame was accepted by the subscriber's channel.
    /// On failure the subscriber is evicted and `false` is returned.
    pub async fn send_to(
        &self,
        conversation_id: &ConversationId,
        subscriber_id: &SubscriberId,
        frame: PushFrame,
    ) -> bool {
        let delivered = {
            let rooms = self.rooms.read().await;
            match rooms
                .get(conversation_id)
                .and_then(|room| room.get(subscriber_id))
            {
                Some(sender) => sender.try_send(frame).is_ok(),
                None => return false,
            }
        };

        if !delivered {
            self.evict(conversation_id, std::slice::from_ref(subscriber_id))
                .await;
        }
        delivered
    }

    /// Send a heartbeat frame to every subscriber in every room.
    ///
    /// Subscribers that fail delivery are evicted, so an idle hub
    /// sheds dead connections even when nothing is streaming.
    pub async fn beat(&self) {
        let mut evicted: Vec<(ConversationId, SubscriberId)> = Vec::new();

        {
            let rooms = self.rooms.read().await;
            for (conversation_id, room) in rooms.iter() {
                for (subscriber_id, sender) in room {
                    if sender.try_send(PushFrame::Heartbeat).is_err() {
                        evicted.push((*conversation_id, *subscriber_id));
                    }
                }
            }
        }

        for (conversation_id, subscriber_id) in evicted {
            self.evict(&conversation_id, std::slice::from_ref(&subscriber_id))
                .await;
        }
    }

    /// Get count of subscribers in a specific room.
    ///
    /// # Returns
    ///
    /// Number of subscribers currently in the room (0 if no room).
    pub async fn client_count(&self, conversation_id: &ConversationId) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(conversation_id).map(|r| r.len()).unwrap_or(0)
    }

    /// Get all conversation IDs with at least one subscriber.
    pub async fn active_conversations(&self) -> Vec<ConversationId> {
        self.rooms.read().await.keys().copied().collect()
    }

    /// Get total count of subscribers across all rooms.
    pub async fn total_client_count(&self) -> usize {
        self.rooms.read().await.values().map(|r| r.len()).sum()
    }

    /// Spawn a background task that heartbeats all rooms on an interval.
    pub fn spawn_heartbeat(hub: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                hub.beat().await;
            }
        })
    }

    /// Remove the given subscribers from a room, cleaning up the room
    /// if it empties.
    async fn evict(&self, conversation_id: &ConversationId, subscriber_ids: &[SubscriberId]) {
        let mut rooms = self.rooms.write().await;

        if let Some(room) = rooms.get_mut(conversation_id) {
            for subscriber_id in subscriber_ids {
                if room.remove(subscriber_id).is_some() {
                    tracing::debug!(
                        %conversation_id,
                        %subscriber_id,
                        "Evicted unresponsive subscriber"
                    );
                }
            }
            if room.is_empty() {
                rooms.remove(conversation_id);
            }
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Removes a subscriber from its room when dropped.
///
/// Held by the SSE connection task so the hub entry goes away when the
/// response stream is dropped, whatever path ended it.
pub struct SubscriberGuard {
    hub: Arc<BroadcastHub>,
    conversation_id: ConversationId,
    subscriber_id: SubscriberId,
}

impl SubscriberGuard {
    /// Create a guard for an active subscription.
    pub fn new(
        hub: Arc<BroadcastHub>,
        conversation_id: ConversationId,
        subscriber_id: SubscriberId,
    ) -> Self {
        Self {
            hub,
            conversation_id,
            subscriber_id,
        }
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let hub = Arc::clone(&self.hub);
        let conversation_id = self.conversation_id;
        let subscriber_id = self.subscriber_id;
        // Unsubscribing takes the async room lock, so it runs in a task.
        tokio::spawn(async move {
            hub.unsubscribe(&conversation_id, &subscriber_id).await;
        });
    }
}
