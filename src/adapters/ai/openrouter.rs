//! OpenRouter Model - Implementation of ChatModel for OpenRouter's API.
//!
//! Speaks the OpenAI-compatible chat completions protocol with function
//! calling enabled, so the model can ask for weather lookups before
//! composing its reply.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenRouterConfig::new(api_key)
//!     .with_model("gpt-4o-mini")
//!     .with_app_title("Weather Chatbot");
//!
//! let model = OpenRouterModel::new(config);
//! ```

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{ChatModel, ContextTurn, ModelError, ModelTurn, ToolCallRequest};

/// Function definitions advertised to the model on every request.
static TOOL_DEFINITIONS: Lazy<serde_json::Value> = Lazy::new(|| {
    json!([
        {
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Get weather information for a city, current or forecast",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "city": {
                            "type": "string",
                            "description": "City name"
                        },
                        "type": {
                            "type": "string",
                            "enum": ["current", "forecast"],
                            "description": "Type of weather data to retrieve",
                            "default": "current"
                        }
                    },
                    "required": ["city"]
                }
            }
        }
    ])
});

/// Configuration for the OpenRouter model.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model to route to (e.g., "gpt-4o-mini").
    pub model: String,
    /// Base URL for the API (default: https://openrouter.ai/api/v1).
    pub base_url: String,
    /// Referer URL OpenRouter attributes usage to.
    pub app_url: String,
    /// App name shown in OpenRouter dashboards.
    pub app_title: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
}

impl OpenRouterConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            app_url: "http://localhost:3000".to_string(),
            app_title: "Weather Chatbot".to_string(),
            timeout: Duration::from_secs(30),
            temperature: 0.4,
            max_tokens: 1024,
            max_retries: 3,
        }
    }

    /// Sets the model to route to.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the attribution referer URL.
    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = url.into();
        self
    }

    /// Sets the attribution app title.
    pub fn with_app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = title.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the completion token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// OpenRouter API model implementation.
pub struct OpenRouterModel {
    config: OpenRouterConfig,
    client: Client,
}

impl OpenRouterModel {
    /// Creates a new OpenRouter model with the given configuration.
    pub fn new(config: OpenRouterConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Builds the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Converts context turns to the wire request.
    fn to_chat_request(&self, turns: &[ContextTurn]) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: turns.iter().map(to_api_message).collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: Some(TOOL_DEFINITIONS.clone()),
        }
    }

    /// Sends a request and maps transport failures.
    async fn send_request(&self, request: &ChatRequest) -> Result<Response, ModelError> {
        self.client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("HTTP-Referer", &self.config.app_url)
            .header("X-Title", &self.config.app_title)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    ModelError::network(format!("Connection failed: {}", e))
                } else {
                    ModelError::network(e.to_string())
                }
            })
    }

    /// Parses the API response status and handles errors.
    async fn handle_response_status(&self, response: Response) -> Result<Response, ModelError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(ModelError::AuthenticationFailed),
            429 => {
                let retry_after = parse_retry_after(&error_body);
                Err(ModelError::rate_limited(retry_after))
            }
            400 => Err(ModelError::InvalidRequest(error_body)),
            500..=599 => Err(ModelError::unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(ModelError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    /// Parses a completion response body.
    async fn parse_response(&self, response: Response) -> Result<ModelTurn, ModelError> {
        let response = self.handle_response_status(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ModelError::parse(format!("Failed to read response: {}", e)))?;

        parse_completion_body(&body)
    }
}

#[async_trait]
impl ChatModel for OpenRouterModel {
    async fn generate(&self, turns: &[ContextTurn]) -> Result<ModelTurn, ModelError> {
        let request = self.to_chat_request(turns);

        let mut last_error = ModelError::network("No attempts made");
        let mut retry_count = 0;

        while retry_count <= self.config.max_retries {
            match self.send_request(&request).await {
                Ok(response) => match self.parse_response(response).await {
                    Ok(turn) => return Ok(turn),
                    Err(err) => {
                        if !err.is_retryable() || retry_count >= self.config.max_retries {
                            return Err(err);
                        }
                        last_error = err;
                    }
                },
                Err(err) => {
                    if !err.is_retryable() || retry_count >= self.config.max_retries {
                        return Err(err);
                    }
                    last_error = err;
                }
            }

            // Exponential backoff: 1s, 2s, 4s, ...
            let delay = Duration::from_secs(1 << retry_count);
            sleep(delay).await;
            retry_count += 1;
        }

        Err(last_error)
    }
}

/// Maps one context turn to its wire shape.
fn to_api_message(turn: &ContextTurn) -> ApiMessage {
    match turn {
        ContextTurn::System { content } => ApiMessage {
            role: "system".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        ContextTurn::User { content } => ApiMessage {
            role: "user".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        ContextTurn::Assistant {
            content,
            tool_calls,
        } => ApiMessage {
            role: "assistant".to_string(),
            content: content.clone(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls.iter().map(to_api_tool_call).collect())
            },
            tool_call_id: None,
        },
        ContextTurn::ToolResult {
            tool_call_id,
            content,
        } => ApiMessage {
            role: "tool".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.clone()),
        },
    }
}

fn to_api_tool_call(call: &ToolCallRequest) -> ApiToolCall {
    ApiToolCall {
        id: call.id.clone(),
        call_type: "function".to_string(),
        function: ApiFunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

/// Parses a completion body into a model turn.
fn parse_completion_body(body: &str) -> Result<ModelTurn, ModelError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::parse(format!("Failed to parse response: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::parse("No choices in response"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest::new(call.id, call.function.name, call.function.arguments))
        .collect();

    Ok(ModelTurn {
        content: choice.message.content,
        tool_calls,
    })
}

/// Parses retry-after from an error response body.
fn parse_retry_after(error_body: &str) -> u32 {
    // Providers sometimes include "try again in Xs" in the message
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(error_body) {
        if let Some(msg) = parsed.get("error").and_then(|e| e.get("message")) {
            if let Some(s) = msg.as_str() {
                if let Some(idx) = s.find("try again in ") {
                    let rest = &s[idx + 13..];
                    if let Some(num_end) = rest.find(|c: char| !c.is_ascii_digit()) {
                        if let Ok(secs) = rest[..num_end].parse::<u32>() {
                            return secs;
                        }
                    }
                }
            }
        }
    }
    30 // Default retry after
}

// ----- OpenRouter API Types -----

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_works() {
        let config = OpenRouterConfig::new("test-key")
            .with_model("gpt-4o")
            .with_base_url("https://custom.api.com")
            .with_app_title("Test App")
            .with_timeout(Duration::from_secs(10))
            .with_max_retries(1);

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.app_title, "Test App");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn tool_definitions_advertise_get_weather() {
        let tools = &*TOOL_DEFINITIONS;
        assert_eq!(tools[0]["function"]["name"], "get_weather");
        assert_eq!(
            tools[0]["function"]["parameters"]["required"][0],
            "city"
        );
        assert_eq!(
            tools[0]["function"]["parameters"]["properties"]["type"]["enum"][1],
            "forecast"
        );
    }

    #[test]
    fn context_turns_map_to_api_roles() {
        let system = to_api_message(&ContextTurn::system("rules"));
        assert_eq!(system.role, "system");
        assert_eq!(system.content.as_deref(), Some("rules"));

        let tool = to_api_message(&ContextTurn::tool_result("call_1", "31°C"));
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn assistant_turn_carries_tool_calls() {
        let turn = ContextTurn::Assistant {
            content: None,
            tool_calls: vec![ToolCallRequest::new(
                "call_1",
                "get_weather",
                r#"{"city":"Pune"}"#,
            )],
        };

        let message = to_api_message(&turn);
        assert_eq!(message.role, "assistant");
        assert!(message.content.is_none());
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].call_type, "function");
    }

    #[test]
    fn parse_plain_text_completion() {
        let body = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "It's sunny in Pune."}
            }]
        }"#;

        let turn = parse_completion_body(body).unwrap();
        assert_eq!(turn.content.as_deref(), Some("It's sunny in Pune."));
        assert!(!turn.has_tool_calls());
    }

    #[test]
    fn parse_tool_call_completion() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"city\":\"Pune\",\"type\":\"forecast\"}"
                        }
                    }]
                }
            }]
        }"#;

        let turn = parse_completion_body(body).unwrap();
        assert!(turn.has_tool_calls());
        assert_eq!(turn.tool_calls[0].id, "call_abc");
        assert_eq!(turn.tool_calls[0].name, "get_weather");
        assert!(turn.tool_calls[0].arguments.contains("forecast"));
    }

    #[test]
    fn parse_empty_choices_is_an_error() {
        let result = parse_completion_body(r#"{"choices": []}"#);
        assert!(matches!(result, Err(ModelError::Parse(_))));
    }

    #[test]
    fn parse_retry_after_from_message() {
        let error = r#"{"error":{"message":"Rate limit exceeded. Please try again in 30 seconds."}}"#;
        assert_eq!(parse_retry_after(error), 30);
    }

    #[test]
    fn parse_retry_after_default() {
        let error = r#"{"error":{"message":"Something went wrong"}}"#;
        assert_eq!(parse_retry_after(error), 30);
    }
}
