//! HTTP client for cleaning chunks through the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{cleaning_prompt, CleanError, CleanRequest, CleaningClient};
use crate::error::{CleanerError, Result};
use crate::types::ApiConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

/// Request payload for the messages endpoint.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

/// Response from the messages endpoint.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl AnthropicClient {
    /// Create a new client. Fails if no API key is configured.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CleanerError::invalid_config("ANTHROPIC_API_KEY is not set")
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| CleanerError::invalid_config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CleaningClient for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn clean(&self, request: CleanRequest<'_>) -> std::result::Result<String, CleanError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![Message {
                role: "user",
                content: cleaning_prompt(request.raw_text, request.context),
            }],
        };

        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| CleanError::Transient(format!("request failed: {}", e)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CleanError::Transient(format!("failed to read response body: {}", e)))?;

        if let Some(ctx) = request.context {
            debug!(
                file = %ctx.file_id,
                chunk = ctx.chunk_number,
                status,
                preview = %text.chars().take(500).collect::<String>(),
                "Raw API response"
            );
        }

        classify_response(status, &text)
    }
}

/// Map an HTTP status and body to cleaned text or a classified error.
///
/// 2xx yields the first text block, trimmed. Bodies mentioning content
/// filtering are `ContentFiltered`; 408, 429 and 5xx (including 529
/// overloaded) are `Transient`; any other status is `Fatal`.
pub fn classify_response(status: u16, body: &str) -> std::result::Result<String, CleanError> {
    if (200..300).contains(&status) {
        let parsed: MessagesResponse = serde_json::from_str(body)
            .map_err(|e| CleanError::Transient(format!("malformed response: {}", e)))?;
        return parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| CleanError::Transient("response contained no text".to_string()));
    }

    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => format!("{} ({}): {}", status, err.error.kind, err.error.message),
        Err(_) => format!("{}: {}", status, body.trim()),
    };

    if body.to_lowercase().contains("content filtering") {
        warn!(status, "Content filter triggered");
        return Err(CleanError::ContentFiltered(message));
    }

    match status {
        408 | 429 | 500..=599 => Err(CleanError::Transient(message)),
        _ => Err(CleanError::Fatal(message)),
    }
}
