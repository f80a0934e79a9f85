//! Completion clients for hosted language models.
//!
//! One trait, [`CompletionProvider`], covers both model calls in a pipeline
//! run. [`LlmClient`] implements it over plain HTTP for OpenAI-compatible chat
//! completion APIs and the Anthropic messages API. Requests are single-turn:
//! no conversation state is carried between calls.

use crate::config::LlmConfig;
use crate::otel::llm_span;
use crate::types::{AskError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::Instrument;

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    /// Infer the provider from a model name (`claude*` / `anthropic*` -> Anthropic).
    pub fn from_model(model: &str) -> Self {
        if model.starts_with("claude") || model.starts_with("anthropic") {
            LlmProvider::Anthropic
        } else {
            LlmProvider::OpenAI
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// One single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
        }
    }
}

/// Failure talking to the completion service.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Transport failure (connect, timeout, body read)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Parse(String),
}

/// A service that turns a prompt into text.
///
/// An `Ok` result may be empty; callers decide what an empty completion means.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError>;

    /// Model identifier used for logging.
    fn model(&self) -> &str;
}

/// OpenAI API response.
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

/// Anthropic API response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP completion client.
pub struct LlmClient {
    provider: LlmProvider,
    model: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl LlmClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AskError::Config` if the HTTP client cannot be built
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let provider = config.provider();
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AskError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok(Self {
            provider,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn call_openai(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "user", "content": request.prompt}
                ],
                "max_tokens": request.max_tokens,
                "temperature": request.temperature
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OpenAIResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::Parse(format!("OpenAI response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::Parse("no choices in OpenAI response".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn call_anthropic(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.model,
                "max_tokens": request.max_tokens,
                "messages": [
                    {"role": "user", "content": request.prompt}
                ],
                "temperature": request.temperature
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::Parse(format!("Anthropic response: {}", e)))?;

        Ok(parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let span = llm_span(self.provider.as_str(), &self.model, request.max_tokens);
        async {
            let result = match self.provider {
                LlmProvider::OpenAI => self.call_openai(request).await,
                LlmProvider::Anthropic => self.call_anthropic(request).await,
            };
            match &result {
                Ok(text) => tracing::debug!(chars = text.len(), "Completion received"),
                Err(e) => tracing::error!(error = %e, "Completion failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn model(&self) -> &str {
        &self.model
    }
}
