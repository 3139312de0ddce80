//! HTTP adapters - the REST and SSE surface.
//!
//! # Components
//!
//! - [`handlers`] - route handlers and the shared [`AppState`]
//! - [`routes`] - router assembly and middleware layers
//! - [`dto`] - JSON request/response types
//! - [`error`] - port-error to HTTP-status mapping

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

pub use error::ApiError;
pub use handlers::AppState;
pub use routes::app_router;
