//! Chat model configuration (OpenRouter)

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Chat model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// OpenRouter API key
    pub openrouter_api_key: Option<String>,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenRouter API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// App URL sent as the HTTP-Referer header
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// App name sent as the X-Title header
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Maximum tool rounds before a reply is abandoned
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if an API key is configured
    pub fn has_key(&self) -> bool {
        self.openrouter_api_key
            .as_ref()
            .is_some_and(|k| !k.is_empty())
    }

    /// Validate chat model configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_key() {
            return Err(ValidationError::MissingRequired("OPENROUTER_API_KEY"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidTemperature);
        }
        if self.max_tool_rounds == 0 || self.max_tool_rounds > 10 {
            return Err(ValidationError::InvalidToolRounds);
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            app_url: default_app_url(),
            app_title: default_app_title(),
            timeout_secs: default_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_title() -> String {
    "Weather Chatbot".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_tool_rounds() -> u32 {
    5
}
