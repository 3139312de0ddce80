//! Weather service port - city lookups against a weather provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which view of the weather a lookup wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastKind {
    /// Conditions right now.
    #[default]
    Current,
    /// Five day outlook.
    Forecast,
}

/// Current conditions for one city, as served by the REST endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temp: f64,
    pub humidity: u32,
    pub wind: f64,
    pub condition: String,
}

/// City weather lookups.
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Formatted weather text for the chat tool.
    ///
    /// Lookup failures come back as user-facing text rather than errors,
    /// so a misspelled city never aborts a reply.
    async fn summary(&self, city: &str, kind: ForecastKind) -> String;

    /// Structured current conditions for one city.
    async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError>;
}

/// Errors from the weather provider.
#[derive(Debug, Clone, Error)]
pub enum WeatherError {
    /// Provider does not know the city.
    #[error("city not found: {city}")]
    CityNotFound {
        /// The city that was asked for.
        city: String,
    },

    /// Provider returned a non-success status.
    #[error("weather provider error ({status}): {message}")]
    Upstream {
        /// HTTP status from the provider.
        status: u16,
        /// Error details.
        message: String,
    },

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse provider response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl WeatherError {
    /// Creates a city not found error.
    pub fn city_not_found(city: impl Into<String>) -> Self {
        WeatherError::CityNotFound { city: city.into() }
    }

    /// Creates an upstream error.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        WeatherError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        WeatherError::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        WeatherError::Parse(message.into())
    }
}
