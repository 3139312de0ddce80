//! Application handlers.
//!
//! One handler per control input:
//!
//! - [`submit_message`] - user message intake, spawns reply generation
//! - [`generate_reply`] - the reply generation state machine
//! - [`connect_stream`] - reconnection protocol for push subscribers

mod connect_stream;
mod generate_reply;
mod submit_message;

pub use connect_stream::{ConnectStreamError, ConnectStreamHandler};
pub use generate_reply::{OrchestratorConfig, ReplyError, ReplyOrchestrator};
pub use submit_message::{
    SubmitMessageCommand, SubmitMessageError, SubmitMessageHandler, SubmitMessageResult,
};
