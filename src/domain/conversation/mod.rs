//! Conversation domain module.
//!
//! Conversations hold the chat transcript shown to users, the condensed
//! history handed to the model, and the weather context carried between
//! turns.

mod conversation;
mod history;
mod message;

pub use conversation::{Conversation, DEFAULT_TITLE};
pub use history::{HistoryTurn, TurnRole};
pub use message::{Message, Role};
