//! PostgreSQL adapters - Database implementations for persistence ports.

mod conversation_store;

pub use conversation_store::PostgresConversationStore;
