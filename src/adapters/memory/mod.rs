//! In-memory adapter implementations for testing.

mod conversation_store;
mod event_log;

pub use conversation_store::InMemoryConversationStore;
pub use event_log::InMemoryEventLog;
