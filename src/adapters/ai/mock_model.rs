//! Mock Chat Model for testing.
//!
//! Provides a configurable mock implementation of the ChatModel port,
//! allowing tests to run without calling real AI APIs.
//!
//! # Features
//!
//! - Pre-configured replies and tool call requests
//! - Simulated delays for timeout testing
//! - Error injection for resilience testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let model = MockChatModel::new()
//!     .with_tool_call("call_1", "get_weather", r#"{"city":"Pune"}"#)
//!     .with_reply("It's 31°C and sunny in Pune.");
//!
//! let turn = model.generate(&turns).await?;
//! assert!(turn.has_tool_calls());
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{ChatModel, ContextTurn, ModelError, ModelTurn, ToolCallRequest};

/// Mock chat model for testing.
///
/// Configurable to return specific turns, simulate delays, or inject errors.
#[derive(Debug, Clone)]
pub struct MockChatModel {
    /// Pre-configured turns (consumed in order).
    replies: Arc<Mutex<VecDeque<Result<ModelTurn, ModelError>>>>,
    /// Simulated latency per request.
    delay: Duration,
    /// Call history for verification.
    calls: Arc<Mutex<Vec<Vec<ContextTurn>>>>,
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatModel {
    /// Creates a new mock model with default settings.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a plain text reply to the queue.
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.with_turn(ModelTurn::text(content))
    }

    /// Adds a single tool call request to the queue.
    pub fn with_tool_call(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        self.with_turn(ModelTurn::tool_requests(vec![ToolCallRequest::new(
            id, name, arguments,
        )]))
    }

    /// Adds a fully configured turn to the queue.
    pub fn with_turn(self, turn: ModelTurn) -> Self {
        let mut replies = self.replies.lock().unwrap();
        replies.push_back(Ok(turn));
        drop(replies);
        self
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: ModelError) -> Self {
        let mut replies = self.replies.lock().unwrap();
        replies.push_back(Err(error));
        drop(replies);
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of calls made to this model.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Returns all recorded calls.
    pub fn get_calls(&self) -> Vec<Vec<ContextTurn>> {
        self.calls.lock().unwrap().clone()
    }

    /// Clears the call history.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Gets the next reply or a default.
    fn next_reply(&self) -> Result<ModelTurn, ModelError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelTurn::text("Mock reply")))
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn generate(&self, turns: &[ContextTurn]) -> Result<ModelTurn, ModelError> {
        // Record the call
        self.calls.lock().unwrap().push(turns.to_vec());

        // Simulate delay
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        self.next_reply()
    }
}
