//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Creates a new random ConversationId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ConversationId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a message within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random MessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a MessageId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a connected stream subscriber.
///
/// Minted per SSE connection, so the same browser tab gets a fresh
/// identity on every reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Creates a new random SubscriberId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a SubscriberId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubscriberId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod conversation_id {
        use super::*;

        #[test]
        fn generates_unique_values() {
            let id1 = ConversationId::new();
            let id2 = ConversationId::new();
            assert_ne!(id1, id2);
        }

        #[test]
        fn parses_from_valid_string() {
            let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
            let id: ConversationId = uuid_str.parse().unwrap();
            assert_eq!(id.to_string(), uuid_str);
        }

        #[test]
        fn rejects_invalid_string() {
            let result = "not-a-uuid".parse::<ConversationId>();
            assert!(result.is_err());
        }

        #[test]
        fn from_uuid_preserves_value() {
            let uuid = Uuid::new_v4();
            let id = ConversationId::from_uuid(uuid);
            assert_eq!(id.as_uuid(), &uuid);
        }

        #[test]
        fn serializes_transparently_to_json() {
            let id = ConversationId::new();
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id));
        }
    }

    mod message_id {
        use super::*;

        #[test]
        fn generates_unique_values() {
            let id1 = MessageId::new();
            let id2 = MessageId::new();
            assert_ne!(id1, id2);
        }

        #[test]
        fn parses_from_valid_string() {
            let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
            let id: MessageId = uuid_str.parse().unwrap();
            assert_eq!(id.to_string(), uuid_str);
        }

        #[test]
        fn from_uuid_preserves_value() {
            let uuid = Uuid::new_v4();
            let id = MessageId::from_uuid(uuid);
            assert_eq!(id.as_uuid(), &uuid);
        }
    }

    mod subscriber_id {
        use super::*;

        #[test]
        fn generates_unique_values() {
            let id1 = SubscriberId::new();
            let id2 = SubscriberId::new();
            assert_ne!(id1, id2);
        }

        #[test]
        fn round_trips_through_display_and_parse() {
            let id = SubscriberId::new();
            let parsed: SubscriberId = id.to_string().parse().unwrap();
            assert_eq!(id, parsed);
        }
    }
}
