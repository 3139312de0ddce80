//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, value objects, and error types
//! that form the vocabulary of the Nimbus domain.

mod ids;
mod timestamp;
mod state_machine;
mod errors;

pub use ids::{ConversationId, MessageId, SubscriberId};
pub use timestamp::Timestamp;
pub use state_machine::StateMachine;
pub use errors::{DomainError, ErrorCode, ValidationError};
