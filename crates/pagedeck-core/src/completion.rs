use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiConfig;
use crate::error::{CoreError, Result};

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// One request per call, no retries.
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 1],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl CompletionClient {
    pub fn new(config: &AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    /// Send `prompt` as a single user turn and return the first choice's text.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: [RequestMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(url = %url, model = %self.model, prompt_chars = prompt.chars().count(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Network(format!("endpoint returned {status}")));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("failed to read response: {e}")))?;

        Self::parse_response(&raw)
    }

    fn parse_response(body: &str) -> Result<String> {
        let response: CompletionResponse = serde_json::from_str(body)
            .map_err(|e| CoreError::Parse(format!("invalid completion response: {e}")))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Parse("completion response has no choices".into()))?;
        choice
            .message
            .content
            .ok_or_else(|| CoreError::Parse("completion choice has no content".into()))
    }
}
