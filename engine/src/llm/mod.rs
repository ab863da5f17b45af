//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for interacting with multiple LLM providers
//! (OpenAI, Ollama, Anthropic). The LLMProvider trait defines the contract that all
//! providers must implement, enabling the LLM router to work with multiple providers
//! transparently and to stand in as the engine's generation port.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::GenerationRequest;

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use router::LLMRouter;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Timeout => EngineError::LLMTimeout,
            LLMError::NetworkError(msg) => EngineError::Network(msg),
            other => EngineError::LLMProvider(crate::secrets::scrub(&other.to_string())),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openai", "anthropic")
    fn name(&self) -> &str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama), false for cloud providers
    fn is_local(&self) -> bool;

    /// Returns the estimated cost in USD for `tokens` tokens.
    /// Local providers should return 0.0
    fn estimated_cost(&self, tokens: usize) -> f64;

    /// Complete a single system + user prompt pair
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text, never empty
    /// * `Err(LLMError)` - If the request fails
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Map a non-success HTTP status from a provider API into an `LLMError`.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: String) -> LLMError {
    match status.as_u16() {
        401 | 403 => LLMError::AuthenticationFailed(body),
        429 => LLMError::RateLimitExceeded,
        500..=599 => LLMError::ProviderUnavailable(format!("{} API error ({}): {}", provider, status, body)),
        _ => LLMError::InvalidRequest(body),
    }
}

/// Map a reqwest transport error into an `LLMError`.
pub(crate) fn transport_error(err: reqwest::Error) -> LLMError {
    if err.is_timeout() {
        LLMError::Timeout
    } else if err.is_connect() {
        LLMError::ProviderUnavailable(err.to_string())
    } else {
        LLMError::NetworkError(err.to_string())
    }
}

/// Reject empty completions so the router moves on to the next provider.
pub(crate) fn non_empty(content: Option<&str>) -> Result<String> {
    match content.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(LLMError::ParseError("Empty content".to_string())),
    }
}
