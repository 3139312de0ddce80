//! Weather provider configuration (OpenWeather)

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Weather provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeather API key
    pub openweather_api_key: Option<String>,

    /// OpenWeather API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl WeatherConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if an API key is configured
    pub fn has_key(&self) -> bool {
        self.openweather_api_key
            .as_ref()
            .is_some_and(|k| !k.is_empty())
    }

    /// Validate weather provider configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_key() {
            return Err(ValidationError::MissingRequired("OPENWEATHER_API_KEY"));
        }
        Ok(())
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_config_defaults() {
        let config = WeatherConfig::default();
        assert_eq!(config.base_url, "https://api.openweathermap.org/data/2.5");
        assert_eq!(config.timeout_secs, 10);
        assert!(!config.has_key());
    }

    #[test]
    fn test_validation_missing_key() {
        let config = WeatherConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        let config = WeatherConfig {
            openweather_api_key: Some("owm-key".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
