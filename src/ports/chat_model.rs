//! Chat model port - tool-capable text generation.
//!
//! One request per decision point: the model either answers with text
//! or asks for tool invocations, and the caller loops until it has a
//! textual reply.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::conversation::{HistoryTurn, TurnRole};

/// One turn of context handed to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextTurn {
    /// System instructions.
    System { content: String },

    /// User input.
    User { content: String },

    /// A prior assistant turn, possibly one that requested tools.
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },

    /// Result of a tool the assistant requested.
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

impl ContextTurn {
    /// Creates a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        ContextTurn::System {
            content: content.into(),
        }
    }

    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        ContextTurn::User {
            content: content.into(),
        }
    }

    /// Creates a plain assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        ContextTurn::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Creates a tool result turn.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ContextTurn::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

impl From<&HistoryTurn> for ContextTurn {
    fn from(turn: &HistoryTurn) -> Self {
        match turn.role {
            TurnRole::Human => ContextTurn::user(turn.text.clone()),
            TurnRole::Ai => ContextTurn::assistant(turn.text.clone()),
        }
    }
}

/// A tool invocation the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Provider-assigned call ID, echoed back with the tool result.
    pub id: String,

    /// Tool function name.
    pub name: String,

    /// Raw JSON arguments, exactly as the model produced them.
    pub arguments: String,
}

impl ToolCallRequest {
    /// Creates a tool call request.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Deserializes the JSON arguments into a typed struct.
    pub fn parse_arguments<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// What the model produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    /// Reply text, if the model answered directly.
    pub content: Option<String>,

    /// Tool invocations the model wants executed before answering.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelTurn {
    /// Creates a plain text turn.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Creates a turn requesting tool invocations.
    pub fn tool_requests(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    /// True if the model asked for tools.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Tool-capable chat completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Runs one completion over the given context.
    async fn generate(&self, turns: &[ContextTurn]) -> Result<ModelTurn, ModelError>;
}

/// Errors from the chat model.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Rate limited by provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until retry is allowed.
        retry_after_secs: u32,
    },

    /// Provider is unavailable.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out.
    #[error("request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u32,
    },
}

impl ModelError {
    /// Creates a rate limited error.
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        ModelError::RateLimited { retry_after_secs }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        ModelError::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        ModelError::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        ModelError::Parse(message.into())
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ModelError::InvalidRequest(message.into())
    }

    /// Returns true if the error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. }
                | ModelError::Unavailable { .. }
                | ModelError::Network(_)
                | ModelError::Timeout { .. }
        )
    }
}
