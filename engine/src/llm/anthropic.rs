//! Anthropic Messages API provider

use super::{non_empty, status_error, transport_error, LLMError, LLMProvider};
use crate::config::AnthropicConfig;
use crate::secrets::SecretCache;
use async_trait::async_trait;
use sdk::types::GenerationRequest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub struct AnthropicProvider {
    config: AnthropicConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            config,
            secret_cache,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // Approx $0.003 per 1k input tokens for Sonnet
        (tokens as f64 / 1000.0) * 0.003
    }

    async fn check_health(&self) -> bool {
        let Ok(Some(api_key)) = self.secret_cache.get_secret("anthropic_api_key") else {
            return false;
        };

        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .header("x-api-key", api_key.unsecure())
            .header("anthropic-version", "2023-06-01")
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Anthropic health probe failed: {}", e);
                false
            }
        }
    }

    async fn complete(&self, request: &GenerationRequest) -> super::Result<String> {
        let api_key = self
            .secret_cache
            .require_secret("anthropic_api_key")
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));

        let payload = json!({
            "model": self.config.model,
            "system": request.system_prompt,
            "messages": [
                { "role": "user", "content": request.user_prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key.unsecure())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
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

        // Concatenate every text block; other block types are ignored.
        let text: String = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LLMError::ParseError("No content in response".to_string()))?
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();

        non_empty(Some(&text))
    }
}
