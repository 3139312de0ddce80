//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `ConversationStore` - System of record for conversations
//! - `EventLog` - Durable, ordered per-reply token log
//!
//! ## Integration Ports
//!
//! - `ChatModel` - Tool-capable chat completion
//! - `WeatherService` - City weather lookups

mod chat_model;
mod conversation_store;
mod event_log;
mod weather;

pub use chat_model::{ChatModel, ContextTurn, ModelError, ModelTurn, ToolCallRequest};
pub use conversation_store::{ConversationStore, StoreError};
pub use event_log::{EventLog, EventLogError, LoggedEvent};
pub use weather::{ForecastKind, WeatherError, WeatherReport, WeatherService};
