//! HTTP handlers for the conversation and weather endpoints.
//!
//! These connect Axum routes to the application layer. The SSE events
//! handler is the push-channel entry point: it runs the reconnection
//! protocol and then bridges the subscriber's frame channel into the
//! response body.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use axum::Json;
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::adapters::sse::{BroadcastHub, SubscriberGuard, Subscription};
use crate::application::handlers::{
    ConnectStreamHandler, SubmitMessageCommand, SubmitMessageHandler,
};
use crate::application::stream_registry::StreamSessionRegistry;
use crate::domain::conversation::Conversation;
use crate::domain::foundation::{ConversationId, MessageId};
use crate::domain::streaming::{Cursor, StreamKey};
use crate::ports::{ConversationStore, WeatherService};

use super::dto::{
    ConversationResponse, CreateConversationRequest, EventsQuery, HealthResponse, ResumeResponse,
    SubmitMessageRequest, SubmitMessageResponse, WeatherQuery,
};
use super::error::ApiError;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub registry: Arc<StreamSessionRegistry>,
    pub hub: Arc<BroadcastHub>,
    pub weather: Arc<dyn WeatherService>,
    pub submit: Arc<SubmitMessageHandler>,
    pub connect: Arc<ConnectStreamHandler>,
}

/// `POST /api/conversations`
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = Conversation::new(request.title);
    state.store.create(&conversation).await?;

    tracing::info!(conversation_id = %conversation.id(), "Conversation created");
    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse::from(&conversation)),
    ))
}

/// `GET /api/conversations/:id`
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let conversation_id = ConversationId::from_uuid(id);
    let conversation = state
        .store
        .get(conversation_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("conversation not found: {conversation_id}")))?;

    Ok(Json(ConversationResponse::from(&conversation)))
}

/// `POST /api/conversations/:id/messages`
///
/// Returns 202: the user message is durable, the reply streams later.
pub async fn submit_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .submit
        .handle(SubmitMessageCommand {
            conversation_id: ConversationId::from_uuid(id),
            text: request.text,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitMessageResponse {
            message: (&result.message).into(),
        }),
    ))
}

/// `GET /api/conversations/:id/events`
///
/// The long-lived push channel. A resume cursor arrives as `?cursor=`
/// or, on a browser-driven reconnect, as the `Last-Event-ID` header.
pub async fn conversation_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, axum::Error>>>, ApiError> {
    let conversation_id = ConversationId::from_uuid(id);
    let cursor = resume_cursor(&query, &headers)?;

    let Subscription {
        subscriber_id,
        receiver,
    } = state.connect.handle(conversation_id, cursor).await?;

    // The guard lives inside the stream closure, so dropping the SSE
    // body (client gone, any reason) unsubscribes.
    let guard = SubscriberGuard::new(Arc::clone(&state.hub), conversation_id, subscriber_id);
    let stream = ReceiverStream::new(receiver).map(move |frame| {
        let _keep_alive = &guard;
        frame.into_sse_event()
    });

    Ok(Sse::new(stream))
}

/// `GET /api/conversations/:id/messages/:message_id/resume`
///
/// Synchronous point lookup of a reply's accumulated state.
pub async fn resume_message(
    State(state): State<AppState>,
    Path((id, message_id)): Path<(Uuid, Uuid)>,
) -> Json<ResumeResponse> {
    let key = StreamKey::new(
        ConversationId::from_uuid(id),
        MessageId::from_uuid(message_id),
    );
    let state = state.registry.resume(&key).await;
    Json(ResumeResponse::from(state))
}

/// `GET /api/weather?city=`
pub async fn current_weather(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let city = query.city.trim();
    if city.is_empty() {
        return Err(ApiError::bad_request("city cannot be empty"));
    }

    let report = state.weather.current(city).await?;
    Ok(Json(report))
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Picks the resume cursor: explicit query parameter first, then the
/// `Last-Event-ID` header a browser `EventSource` sends on reconnect.
fn resume_cursor(query: &EventsQuery, headers: &HeaderMap) -> Result<Option<Cursor>, ApiError> {
    let raw = query
        .cursor
        .as_deref()
        .or_else(|| {
            headers
                .get("last-event-id")
                .and_then(|value| value.to_str().ok())
        })
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match raw {
        Some(value) => Cursor::parse(value)
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("invalid cursor: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn resume_cursor_prefers_query_parameter() {
        let query = EventsQuery {
            cursor: Some("100-0".to_string()),
        };
        let mut headers = HeaderMap::new();
        headers.insert("last-event-id", HeaderValue::from_static("50-0"));

        let cursor = resume_cursor(&query, &headers).unwrap().unwrap();
        assert_eq!(cursor.as_str(), "100-0");
    }

    #[test]
    fn resume_cursor_falls_back_to_last_event_id() {
        let query = EventsQuery::default();
        let mut headers = HeaderMap::new();
        headers.insert("last-event-id", HeaderValue::from_static("50-3"));

        let cursor = resume_cursor(&query, &headers).unwrap().unwrap();
        assert_eq!(cursor.as_str(), "50-3");
    }

    #[test]
    fn absent_cursor_means_fresh_connection() {
        let cursor = resume_cursor(&EventsQuery::default(), &HeaderMap::new()).unwrap();
        assert!(cursor.is_none());
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        let query = EventsQuery {
            cursor: Some("not a cursor".to_string()),
        };
        assert!(resume_cursor(&query, &HeaderMap::new()).is_err());
    }
}
