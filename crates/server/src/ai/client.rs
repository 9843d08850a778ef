//! Claude API client for the Anthropic Messages API

use std::time::Duration;

use serde::{Deserialize, Serialize};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the Anthropic Claude Messages API
#[derive(Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Individual content block within a response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Request body for the Messages API
#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
}

/// Response from the Messages API
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[allow(dead_code)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

/// Error detail from the Messages API
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ClaudeClient {
    /// Create a new client with the given API key
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Use a different model than the default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single user message with an optional system prompt, return text response
    pub async fn message(&self, system: Option<&str>, user_message: &str) -> Result<String, String> {
        self.converse(system, &[Message::user(user_message)]).await
    }

    /// Send a whole conversation and return the assistant's text reply
    pub async fn converse(
        &self,
        system: Option<&str>,
        messages: &[Message],
    ) -> Result<String, String> {
        let response = self.send(system, messages).await?;
        extract_text(&response)
    }

    /// Send a full request; temperature is pinned to 0 for repeatable extraction
    pub async fn send(
        &self,
        system: Option<&str>,
        messages: &[Message],
    ) -> Result<ApiResponse, String> {
        let request = ApiRequest {
            model: &self.model,
            max_tokens: 4096,
            temperature: 0.0,
            system,
            messages,
        };

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if let Ok(api_err) = serde_json::from_str::<ApiError>(&body) {
                return Err(format!(
                    "Claude API error ({}): {}",
                    status, api_err.error.message
                ));
            }
            return Err(format!("Claude API error ({}): {}", status, body));
        }

        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))
    }
}

/// Extract text content from an API response
pub fn extract_text(response: &ApiResponse) -> Result<String, String> {
    for block in &response.content {
        if let ContentBlock::Text { text } = block {
            return Ok(text.clone());
        }
    }
    Err("No text content in response".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_unknown_blocks_still_yields_text() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "{\"diagnosis\": null}"}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(extract_text(&response).unwrap(), "{\"diagnosis\": null}");
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }
}
