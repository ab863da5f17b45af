//! OpenAI Chat Completions provider

use super::{non_empty, status_error, transport_error, LLMError, LLMProvider};
use crate::config::OpenAIConfig;
use crate::secrets::SecretCache;
use async_trait::async_trait;
use sdk::types::GenerationRequest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub struct OpenAIProvider {
    config: OpenAIConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            config,
            secret_cache,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // Approx $0.002 per 1k tokens for gpt-4o-mini
        (tokens as f64 / 1000.0) * 0.002
    }

    /// Lists models with the configured key, so a revoked key or an
    /// unreachable endpoint reports down.
    async fn check_health(&self) -> bool {
        let Ok(Some(api_key)) = self.secret_cache.get_secret("openai_api_key") else {
            return false;
        };

        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("OpenAI health probe failed: {}", e);
                false
            }
        }
    }

    async fn complete(&self, request: &GenerationRequest) -> super::Result<String> {
        let api_key = self
            .secret_cache
            .require_secret("openai_api_key")
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(self.name(), status, text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str());

        non_empty(content)
    }
}
