//! OpenWeather Service - Implementation of WeatherService for OpenWeatherMap.
//!
//! Serves two callers with different failure contracts: the chat tool,
//! which always gets displayable text back, and the REST endpoint, which
//! gets typed errors to map onto HTTP statuses.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenWeatherConfig::new(api_key)
//!     .with_timeout(Duration::from_secs(10));
//!
//! let service = OpenWeatherService::new(config);
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::ports::{ForecastKind, WeatherError, WeatherReport, WeatherService};

/// Configuration for the OpenWeather service.
#[derive(Debug, Clone)]
pub struct OpenWeatherConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Base URL for the API (default: https://api.openweathermap.org/data/2.5).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl OpenWeatherConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// OpenWeatherMap API service implementation.
pub struct OpenWeatherService {
    config: OpenWeatherConfig,
    client: Client,
}

impl OpenWeatherService {
    /// Creates a new OpenWeather service with the given configuration.
    pub fn new(config: OpenWeatherConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    async fn fetch(&self, endpoint: &str, city: &str) -> Result<Response, WeatherError> {
        let url = format!("{}/{}", self.config.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.config.api_key()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    WeatherError::network(format!("Connection failed: {}", e))
                } else {
                    WeatherError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            404 => Err(WeatherError::city_not_found(city)),
            code => Err(WeatherError::upstream(code, error_body)),
        }
    }

    async fn fetch_current(&self, city: &str) -> Result<CurrentResponse, WeatherError> {
        let response = self.fetch("weather", city).await?;
        response
            .json()
            .await
            .map_err(|e| WeatherError::parse(format!("Failed to parse response: {}", e)))
    }

    async fn fetch_forecast(&self, city: &str) -> Result<ForecastResponse, WeatherError> {
        let response = self.fetch("forecast", city).await?;
        response
            .json()
            .await
            .map_err(|e| WeatherError::parse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl WeatherService for OpenWeatherService {
    async fn summary(&self, city: &str, kind: ForecastKind) -> String {
        match kind {
            ForecastKind::Current => match self.fetch_current(city).await {
                Ok(data) => format_current(&data),
                Err(err) => current_failure_text(city, &err),
            },
            ForecastKind::Forecast => match self.fetch_forecast(city).await {
                Ok(data) => format_forecast(&data),
                Err(err) => forecast_failure_text(city, &err),
            },
        }
    }

    async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let data = self.fetch_current(city).await?;

        Ok(WeatherReport {
            city: data.name.clone(),
            temp: data.main.temp,
            humidity: data.main.humidity,
            wind: data.wind.speed,
            condition: description(&data.weather).to_string(),
        })
    }
}

/// Renders current conditions as chat-tool text.
fn format_current(data: &CurrentResponse) -> String {
    format!(
        "Current weather in {}:\n\
         🌡 Temp: {}°C (feels like {}°C)\n\
         ☁️ {}\n\
         💧 Humidity: {}%\n\
         💨 Wind: {} m/s",
        data.name,
        data.main.temp,
        data.main.feels_like,
        description(&data.weather),
        data.main.humidity,
        data.wind.speed
    )
}

/// Renders a five day forecast as chat-tool text.
///
/// The provider returns three-hourly slots. Only the midday slot of each
/// date is kept, capped at five days.
fn format_forecast(data: &ForecastResponse) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut daily: Vec<&ForecastEntry> = Vec::new();

    for entry in &data.list {
        let date = entry.dt_txt.split(' ').next().unwrap_or("");
        if !seen.contains(date) && entry.dt_txt.contains("12:00:00") {
            seen.insert(date);
            daily.push(entry);
        }
    }

    let blocks: Vec<String> = daily
        .iter()
        .take(5)
        .map(|f| {
            let date = f.dt_txt.split(' ').next().unwrap_or("");
            format!(
                "📅 {}\n\
                 🌡 Temp: {}°C (feels {}°C)\n\
                 ☁️ {}\n\
                 💨 Wind: {} m/s\n",
                date,
                f.main.temp,
                f.main.feels_like,
                description(&f.weather),
                f.wind.speed
            )
        })
        .collect();

    format!(
        "🌦 5-Day Forecast for **{}**:\n\n{}",
        data.city.name,
        blocks.join("\n")
    )
}

/// Chat-tool text for a failed current weather lookup.
fn current_failure_text(city: &str, err: &WeatherError) -> String {
    match err {
        WeatherError::CityNotFound { .. } | WeatherError::Upstream { .. } => {
            format!("Could not get weather for \"{}\". Please try another city.", city)
        }
        WeatherError::Network(_) | WeatherError::Parse(_) => {
            format!("Error looking up weather for \"{}\".", city)
        }
    }
}

/// Chat-tool text for a failed forecast lookup.
fn forecast_failure_text(city: &str, err: &WeatherError) -> String {
    match err {
        WeatherError::CityNotFound { .. } | WeatherError::Upstream { .. } => {
            format!("Could not get forecast for \"{}\".", city)
        }
        WeatherError::Network(_) | WeatherError::Parse(_) => {
            format!("Error looking up weather for \"{}\".", city)
        }
    }
}

fn description(conditions: &[ConditionEntry]) -> &str {
    conditions.first().map(|c| c.description.as_str()).unwrap_or("")
}

// ----- OpenWeather API Types -----

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    name: String,
    main: MainReadings,
    weather: Vec<ConditionEntry>,
    wind: WindReadings,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: u32,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    description: String,
}

#[derive(Debug, Deserialize)]
struct WindReadings {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    city: ForecastCity,
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt_txt: String,
    main: MainReadings,
    weather: Vec<ConditionEntry>,
    wind: WindReadings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_fixture() -> CurrentResponse {
        serde_json::from_str(
            r#"{
                "name": "Pune",
                "main": {"temp": 31.42, "feels_like": 33.1, "humidity": 48},
                "weather": [{"description": "scattered clouds"}],
                "wind": {"speed": 3.6}
            }"#,
        )
        .unwrap()
    }

    fn forecast_fixture() -> ForecastResponse {
        serde_json::from_str(
            r#"{
                "city": {"name": "Pune"},
                "list": [
                    {"dt_txt": "2024-06-10 09:00:00",
                     "main": {"temp": 28.0, "feels_like": 29.0, "humidity": 50},
                     "weather": [{"description": "light rain"}],
                     "wind": {"speed": 2.0}},
                    {"dt_txt": "2024-06-10 12:00:00",
                     "main": {"temp": 31.5, "feels_like": 32.8, "humidity": 44},
                     "weather": [{"description": "broken clouds"}],
                     "wind": {"speed": 3.1}},
                    {"dt_txt": "2024-06-10 15:00:00",
                     "main": {"temp": 30.0, "feels_like": 31.0, "humidity": 46},
                     "weather": [{"description": "broken clouds"}],
                     "wind": {"speed": 2.9}},
                    {"dt_txt": "2024-06-11 12:00:00",
                     "main": {"temp": 29.7, "feels_like": 30.9, "humidity": 52},
                     "weather": [{"description": "overcast clouds"}],
                     "wind": {"speed": 4.2}}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn current_format_matches_chat_layout() {
        let text = format_current(&current_fixture());

        assert_eq!(
            text,
            "Current weather in Pune:\n\
             🌡 Temp: 31.42°C (feels like 33.1°C)\n\
             ☁️ scattered clouds\n\
             💧 Humidity: 48%\n\
             💨 Wind: 3.6 m/s"
        );
    }

    #[test]
    fn forecast_keeps_only_midday_slots() {
        let text = format_forecast(&forecast_fixture());

        assert!(text.starts_with("🌦 5-Day Forecast for **Pune**:\n\n"));
        assert!(text.contains("📅 2024-06-10\n🌡 Temp: 31.5°C (feels 32.8°C)"));
        assert!(text.contains("📅 2024-06-11"));
        // The 09:00 and 15:00 slots of the same date are dropped
        assert!(!text.contains("28°C"));
        assert!(!text.contains("light rain"));
    }

    #[test]
    fn forecast_caps_at_five_days() {
        let mut data = forecast_fixture();
        for day in 12..20 {
            let extra: ForecastEntry = serde_json::from_str(&format!(
                r#"{{"dt_txt": "2024-06-{} 12:00:00",
                    "main": {{"temp": 25.0, "feels_like": 25.0, "humidity": 40}},
                    "weather": [{{"description": "clear sky"}}],
                    "wind": {{"speed": 1.0}}}}"#,
                day
            ))
            .unwrap();
            data.list.push(extra);
        }

        let text = format_forecast(&data);
        assert_eq!(text.matches("📅 ").count(), 5);
    }

    #[test]
    fn lookup_failures_become_user_facing_text() {
        let not_found = WeatherError::city_not_found("Atlantida");
        assert_eq!(
            current_failure_text("Atlantida", &not_found),
            "Could not get weather for \"Atlantida\". Please try another city."
        );
        assert_eq!(
            forecast_failure_text("Atlantida", &not_found),
            "Could not get forecast for \"Atlantida\"."
        );

        let network = WeatherError::network("connection reset");
        assert_eq!(
            current_failure_text("Pune", &network),
            "Error looking up weather for \"Pune\"."
        );
        assert_eq!(
            forecast_failure_text("Pune", &network),
            "Error looking up weather for \"Pune\"."
        );
    }

    #[test]
    fn config_builder_works() {
        let config = OpenWeatherConfig::new("owm-key")
            .with_base_url("https://proxy.example.com/data/2.5")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "https://proxy.example.com/data/2.5");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.api_key(), "owm-key");
    }
}
