//! Streaming domain module.
//!
//! Types shared by the broadcast hub, the durable token log, and the
//! SSE surface: stream events, log cursors, and per-reply stream keys.

mod cursor;
mod event;
mod phase;

pub use cursor::{Cursor, StreamKey};
pub use event::{MessageSnapshot, StreamEvent};
pub use phase::ReplyPhase;
