//! Language-model seam used by `synth`. Nothing else in the pipeline calls
//! a model.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::PipelineError;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const SERVICE: &str = "anthropic messages api";

pub trait LanguageModel {
    fn model_name(&self) -> &str;

    fn complete(&self, system: &str, prompt: &str) -> Result<String, PipelineError>;
}

pub struct AnthropicClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self, PipelineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|error| unavailable(format!("failed to build http client: {error}")))?;

        Ok(Self {
            client,
            endpoint: ANTHROPIC_MESSAGES_URL.to_string(),
            api_key,
            model,
            max_tokens,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, system: &str, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [
                { "role": "user", "content": prompt },
            ],
        })
    }
}

impl LanguageModel for AnthropicClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, system: &str, prompt: &str) -> Result<String, PipelineError> {
        debug!(endpoint = %self.endpoint, model = %self.model, "sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.request_body(system, prompt))
            .send()
            .map_err(|error| unavailable(format!("request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(unavailable(format!("http {}: {}", status.as_u16(), body.trim())));
        }

        let body: Value = response
            .json()
            .map_err(|error| unavailable(format!("invalid response body: {error}")))?;
        response_text(&body)
    }
}

/// Concatenated text blocks of a Messages API response.
pub fn response_text(body: &Value) -> Result<String, PipelineError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| unavailable("response has no content array".to_string()))?;

    let text = blocks
        .iter()
        .filter(|block| block["type"].as_str().unwrap_or("text") == "text")
        .filter_map(|block| block["text"].as_str())
        .collect::<Vec<&str>>()
        .join("");

    if text.trim().is_empty() {
        return Err(unavailable("response contains no text".to_string()));
    }
    Ok(text)
}

fn unavailable(reason: String) -> PipelineError {
    PipelineError::UpstreamUnavailable {
        service: SERVICE.to_string(),
        reason,
    }
}
