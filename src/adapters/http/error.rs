//! API error mapping for the HTTP surface.
//!
//! Every port and handler error converts into an [`ApiError`] carrying
//! the status code and a stable machine-readable code, rendered as the
//! common error JSON payload.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::application::handlers::{ConnectStreamError, SubmitMessageError};
use crate::ports::{StoreError, WeatherError};

use super::dto::ErrorResponse;

/// An HTTP-mappable error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error with an explicit status and code.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 400 with a validation code.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }

    /// 404 for a missing resource.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// 503 when a backing store is down.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            message,
        )
    }

    /// 502 when an upstream provider fails.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_FAILED", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "Request failed: {}", self.message);
        }
        let body = ErrorResponse::new(self.code, self.message);
        (self.status, Json(body)).into_response()
    }
}

impl From<SubmitMessageError> for ApiError {
    fn from(error: SubmitMessageError) -> Self {
        match error {
            SubmitMessageError::EmptyMessage | SubmitMessageError::MessageTooLong { .. } => {
                ApiError::bad_request(error.to_string())
            }
            SubmitMessageError::ConversationNotFound(_) => ApiError::not_found(error.to_string()),
            SubmitMessageError::StoreUnavailable(_) => {
                ApiError::service_unavailable(error.to_string())
            }
        }
    }
}

impl From<ConnectStreamError> for ApiError {
    fn from(error: ConnectStreamError) -> Self {
        match error {
            ConnectStreamError::ConversationNotFound(_) => ApiError::not_found(error.to_string()),
            ConnectStreamError::StoreUnavailable(_) => {
                ApiError::service_unavailable(error.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(_) | StoreError::MessageNotFound(_) => {
                ApiError::not_found(error.to_string())
            }
            StoreError::Database(_) => ApiError::service_unavailable(error.to_string()),
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(error: WeatherError) -> Self {
        match error {
            WeatherError::CityNotFound { .. } => ApiError::not_found(error.to_string()),
            _ => ApiError::bad_gateway(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ConversationId;

    #[test]
    fn submit_errors_map_to_statuses() {
        let err: ApiError = SubmitMessageError::EmptyMessage.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = SubmitMessageError::ConversationNotFound(ConversationId::new()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = SubmitMessageError::StoreUnavailable("down".to_string()).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn weather_errors_map_to_statuses() {
        let err: ApiError = WeatherError::city_not_found("Atlantis").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = WeatherError::upstream(503, "maintenance").into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
