//! Chat Model Adapters.
//!
//! Implementations of the ChatModel port.
//!
//! ## Available Adapters
//!
//! - `MockChatModel` - Configurable mock for testing
//! - `OpenRouterModel` - OpenRouter's OpenAI-compatible API with tool calling

mod mock_model;
mod openrouter;

pub use mock_model::MockChatModel;
pub use openrouter::{OpenRouterConfig, OpenRouterModel};
