//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i32,
        max: i32,
        actual: i32,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i32, max: i32, actual: i32) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    EmptyField,
    OutOfRange,
    InvalidFormat,

    // Not found errors
    ConversationNotFound,
    MessageNotFound,
    StreamNotFound,

    // State errors
    InvalidStateTransition,
    MessageAlreadyCompleted,

    // AI errors
    AIProviderError,

    // Infrastructure errors
    DatabaseError,
    CacheError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::EmptyField => "EMPTY_FIELD",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::ConversationNotFound => "CONVERSATION_NOT_FOUND",
            ErrorCode::MessageNotFound => "MESSAGE_NOT_FOUND",
            ErrorCode::StreamNotFound => "STREAM_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::MessageAlreadyCompleted => "MESSAGE_ALREADY_COMPLETED",
            ErrorCode::AIProviderError => "AI_PROVIDER_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::CacheError => "CACHE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("city");
        assert_eq!(format!("{}", err), "Field 'city' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("length", 1, 4000, 4500);
        assert_eq!(
            format!("{}", err),
            "Field 'length' must be between 1 and 4000, got 4500"
        );
    }

    #[test]
    fn validation_error_invalid_format_displays_correctly() {
        let err = ValidationError::invalid_format("cursor", "missing '-' separator");
        assert_eq!(
            format!("{}", err),
            "Field 'cursor' has invalid format: missing '-' separator"
        );
    }

    #[test]
    fn validation_errors_compare_by_value() {
        assert_eq!(
            ValidationError::empty_field("city"),
            ValidationError::empty_field("city")
        );
        assert_ne!(
            ValidationError::empty_field("city"),
            ValidationError::empty_field("title")
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::ConversationNotFound, "Conversation not found");
        assert_eq!(
            format!("{}", err),
            "[CONVERSATION_NOT_FOUND] Conversation not found"
        );
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::ValidationFailed, "Validation failed")
            .with_detail("field", "message")
            .with_detail("reason", "too long");

        assert_eq!(err.details.get("field"), Some(&"message".to_string()));
        assert_eq!(err.details.get("reason"), Some(&"too long".to_string()));
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(format!("{}", ErrorCode::StreamNotFound), "STREAM_NOT_FOUND");
        assert_eq!(format!("{}", ErrorCode::InternalError), "INTERNAL_ERROR");
    }
}
