//! Axum router for the nimbus API.

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    conversation_events, create_conversation, current_weather, get_conversation, health,
    resume_message, submit_message, AppState,
};

/// Request timeout for the non-streaming routes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the complete application router.
///
/// # Routes
///
/// - `POST /api/conversations` - create a conversation
/// - `GET  /api/conversations/:id` - fetch a conversation with messages
/// - `POST /api/conversations/:id/messages` - submit a user message
/// - `GET  /api/conversations/:id/events` - SSE push channel
/// - `GET  /api/conversations/:id/messages/:message_id/resume` - point lookup
/// - `GET  /api/weather` - current conditions for a city
/// - `GET  /health` - liveness probe
///
/// The SSE route is mounted outside the timeout layer; every other
/// route gets a 30 second budget.
pub fn app_router(state: AppState) -> Router {
    let timed = Router::new()
        .route("/api/conversations", post(create_conversation))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/messages", post(submit_message))
        .route(
            "/api/conversations/:id/messages/:message_id/resume",
            get(resume_message),
        )
        .route("/api/weather", get(current_weather))
        .route("/health", get(health))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    let streaming =
        Router::new().route("/api/conversations/:id/events", get(conversation_events));

    Router::new()
        .merge(timed)
        .merge(streaming)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
