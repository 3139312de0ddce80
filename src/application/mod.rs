//! Application layer - stream sessions and request handlers.
//!
//! Coordinates the domain with the ports: the stream session registry
//! tracks in-flight replies, and the handlers drive message intake,
//! reply generation, and subscriber reconnection.

pub mod handlers;
pub mod stream_registry;

pub use handlers::{
    ConnectStreamError, ConnectStreamHandler, OrchestratorConfig, ReplyError, ReplyOrchestrator,
    SubmitMessageCommand, SubmitMessageError, SubmitMessageHandler, SubmitMessageResult,
};
pub use stream_registry::{
    AppendOutcome, RegistryError, ResumeState, StreamSessionRegistry, StreamStatus,
};
