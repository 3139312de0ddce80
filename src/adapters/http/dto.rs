//! HTTP DTOs for the conversation and weather endpoints.
//!
//! These types define the JSON request/response structure of the REST
//! surface and are the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::stream_registry::{ResumeState, StreamStatus};
use crate::domain::conversation::{Conversation, Message, Role};
use crate::domain::foundation::{ConversationId, MessageId, Timestamp};

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a conversation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateConversationRequest {
    /// Optional explicit title; derived from the first message otherwise.
    #[serde(default)]
    pub title: Option<String>,
}

/// Request to submit a user message.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitMessageRequest {
    /// The message text.
    pub text: String,
}

/// Query parameters for the SSE events endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    /// Cursor of the last event the client processed, if resuming.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Query parameters for the weather endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherQuery {
    /// City to look up.
    pub city: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// One message in a conversation response.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub streaming: bool,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageResponse {
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

/// A conversation with its messages.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<MessageResponse>,
    pub last_city: Option<String>,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}

impl From<&Conversation> for ConversationResponse {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: *conversation.id(),
            title: conversation.title().to_string(),
            messages: conversation.messages().iter().map(MessageResponse::from).collect(),
            last_city: conversation.last_city().map(str::to_string),
            created_at: *conversation.created_at(),
            last_activity: *conversation.last_activity(),
        }
    }
}

/// Response to a message submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitMessageResponse {
    /// The accepted user message; the reply arrives over the stream.
    pub message: MessageResponse,
}

/// Response to a resume point lookup.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeResponse {
    pub found: bool,
    pub status: StreamStatus,
    pub text: String,
}

impl From<ResumeState> for ResumeResponse {
    fn from(state: ResumeState) -> Self {
        Self {
            found: state.found,
            status: state.status,
            text: state.text,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error payload returned on every non-2xx response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    /// Creates an error payload.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_response_copies_fields() {
        let mut conversation = Conversation::new(None);
        conversation.push_message(Message::user("Weather in Pune?").unwrap());

        let response = ConversationResponse::from(&conversation);
        assert_eq!(response.id, *conversation.id());
        assert_eq!(response.title, "Weather in Pune?");
        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.messages[0].role, Role::User);
        assert!(!response.messages[0].streaming);
    }

    #[test]
    fn resume_response_serializes_status_lowercase() {
        let response = ResumeResponse {
            found: true,
            status: StreamStatus::Active,
            text: "partial".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn create_request_title_is_optional() {
        let request: CreateConversationRequest = serde_json::from_str("{}").unwrap();
        assert!(request.title.is_none());
    }
}
