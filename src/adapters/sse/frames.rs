//! Frame types pushed to SSE subscribers.
//!
//! A frame is what travels through a subscriber's channel: either a
//! stream event (with the log cursor it was recorded at, when it has
//! one) or a heartbeat. Frames convert to `axum` SSE events at the
//! connection boundary; the cursor rides in the SSE `id` field so
//! browsers echo it back as `Last-Event-ID` on reconnect.

use axum::response::sse;

use crate::domain::streaming::{Cursor, StreamEvent};

/// One frame on a subscriber's push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushFrame {
    /// A stream event, tagged with its log cursor when the durable
    /// log recorded it. Ephemeral events (status, connected, sync)
    /// carry no cursor.
    Event {
        cursor: Option<Cursor>,
        event: StreamEvent,
    },

    /// Keep-alive marker, rendered as an SSE comment so clients and
    /// proxies see traffic without receiving a data event.
    Heartbeat,
}

impl PushFrame {
    /// Wraps an ephemeral event that has no position in the log.
    pub fn event(event: StreamEvent) -> Self {
        PushFrame::Event {
            cursor: None,
            event,
        }
    }

    /// Wraps an event at the log position the durable log minted for it.
    pub fn logged(cursor: Cursor, event: StreamEvent) -> Self {
        PushFrame::Event {
            cursor: Some(cursor),
            event,
        }
    }

    /// Returns the cursor, if this frame was recorded in the log.
    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            PushFrame::Event { cursor, .. } => cursor.as_ref(),
            PushFrame::Heartbeat => None,
        }
    }

    /// Renders this frame as a wire-level SSE event.
    ///
    /// The event kind becomes the SSE `event` field, the payload is
    /// JSON, and the cursor (when present) becomes the `id` field.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails to serialize.
    pub fn into_sse_event(self) -> Result<sse::Event, axum::Error> {
        match self {
            PushFrame::Event { cursor, event } => {
                let mut sse_event = sse::Event::default().event(event.kind());
                if let Some(cursor) = cursor {
                    sse_event = sse_event.id(cursor.as_str());
                }
                sse_event.json_data(&event)
            }
            PushFrame::Heartbeat => Ok(sse::Event::default().comment("hb")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::MessageId;

    #[test]
    fn event_constructor_carries_no_cursor() {
        let frame = PushFrame::event(StreamEvent::status("processing"));
        assert_eq!(frame.cursor(), None);
    }

    #[test]
    fn logged_constructor_carries_cursor() {
        let cursor = Cursor::new("1718476399123-0");
        let frame = PushFrame::logged(cursor.clone(), StreamEvent::token(MessageId::new(), "Hi"));
        assert_eq!(frame.cursor(), Some(&cursor));
    }

    #[test]
    fn heartbeat_has_no_cursor() {
        assert_eq!(PushFrame::Heartbeat.cursor(), None);
    }

    #[test]
    fn ephemeral_event_renders_to_sse() {
        let frame = PushFrame::event(StreamEvent::status("generating"));
        assert!(frame.into_sse_event().is_ok());
    }

    #[test]
    fn logged_event_renders_to_sse() {
        let frame = PushFrame::logged(
            Cursor::new("42-0"),
            StreamEvent::token(MessageId::new(), "Sunny "),
        );
        assert!(frame.into_sse_event().is_ok());
    }

    #[test]
    fn heartbeat_renders_to_sse() {
        assert!(PushFrame::Heartbeat.into_sse_event().is_ok());
    }
}
