//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `conversation` - Conversation aggregate, messages, model history
//! - `streaming` - Stream events, log cursors, per-reply stream keys
//! - `prompt` - System prompt for the weather assistant

pub mod conversation;
pub mod foundation;
pub mod prompt;
pub mod streaming;
