//! LLM Router
//!
//! Orders the configured providers and fails over between them. The
//! configured default provider is tried first; the rest follow cheapest
//! first. Each attempt runs under its own timeout: local models get extra
//! time for loading, cloud APIs get the configured request timeout.
//!
//! The router is the engine's `GenerationPort`.

use super::{LLMError, LLMProvider};
use crate::config::LLMConfig;
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::ports::GenerationPort;
use sdk::types::{ComponentHealth, GenerationRequest, HealthStatus};
use std::sync::Arc;
use std::time::Duration;

/// Minimum time a local provider is given, covering model load.
const LOCAL_TIMEOUT_SECS: u64 = 120;

/// LLM Router that selects providers and fails over between them
pub struct LLMRouter {
    /// Available LLM providers
    providers: Vec<Box<dyn LLMProvider>>,

    /// LLM configuration
    config: Arc<LLMConfig>,
}

impl LLMRouter {
    /// Create a new LLM router
    ///
    /// # Arguments
    /// * `providers` - List of available LLM providers
    /// * `config` - LLM configuration
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: Arc<LLMConfig>) -> Self {
        Self { providers, config }
    }

    /// Rough token estimate for a request: ~4 characters per token for the
    /// prompts plus the completion budget.
    pub fn estimate_tokens(request: &GenerationRequest) -> usize {
        let prompt_chars = request.system_prompt.len() + request.user_prompt.len();
        prompt_chars / 4 + request.max_tokens as usize
    }

    /// Rank providers for a request of `estimated_tokens` tokens.
    ///
    /// The configured default provider always ranks first. Among the rest,
    /// lower estimated cost ranks higher; ties keep registration order.
    ///
    /// Returns a sorted list of providers (best first)
    pub fn rank_providers(&self, estimated_tokens: usize) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        let default_provider = &self.config.default_provider;
        let score = |p: &dyn LLMProvider| {
            let mut score = 0.0_f64;
            if p.name() == default_provider {
                score += 200.0;
            }
            // Lower cost = higher score
            score - p.estimated_cost(estimated_tokens) * 1000.0
        };

        providers.sort_by(|a, b| {
            score(*b)
                .partial_cmp(&score(*a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        providers
    }

    fn timeout_for(&self, provider: &dyn LLMProvider) -> Duration {
        let configured = self.config.request_timeout_secs;
        if provider.is_local() {
            Duration::from_secs(configured.max(LOCAL_TIMEOUT_SECS))
        } else {
            Duration::from_secs(configured)
        }
    }

    /// Call LLM providers with automatic failover
    ///
    /// Attempts providers in ranked order, each under its own timeout.
    /// Returns the generated text and the name of the provider that produced
    /// it. When every provider fails, the error is `Timeout` if every attempt
    /// timed out and `ProviderUnavailable` otherwise.
    pub async fn call(&self, request: &GenerationRequest) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let ranked_providers = self.rank_providers(Self::estimate_tokens(request));
        let mut all_timed_out = true;

        for provider in ranked_providers {
            let timeout = self.timeout_for(provider);
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout.as_secs()
            );

            match tokio::time::timeout(timeout, provider.complete(request)).await {
                Ok(Ok(text)) => {
                    tracing::info!("Provider {} succeeded", provider.name());
                    return Ok((text, provider.name().to_string()));
                }
                Ok(Err(LLMError::Timeout)) => {
                    tracing::warn!("Provider {} timed out", provider.name());
                }
                Ok(Err(e)) => {
                    all_timed_out = false;
                    tracing::warn!(
                        "Provider {} failed: {}",
                        provider.name(),
                        crate::secrets::scrub(&e.to_string())
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout.as_secs()
                    );
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        if all_timed_out {
            Err(LLMError::Timeout)
        } else {
            Err(LLMError::ProviderUnavailable(
                "All LLM providers failed".to_string(),
            ))
        }
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}

#[async_trait]
impl GenerationPort for LLMRouter {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError> {
        match self.call(request).await {
            Ok((text, _provider)) => Ok(text),
            Err(LLMError::Timeout) => Err(EngineError::LLMTimeout),
            Err(_) => Err(EngineError::AllProvidersExhausted),
        }
    }

    fn model(&self) -> String {
        let chain: Vec<String> = self
            .rank_providers(0)
            .iter()
            .map(|p| format!("{}:{}", p.name(), p.model()))
            .collect();
        if chain.is_empty() {
            "none".to_string()
        } else {
            chain.join(" -> ")
        }
    }

    async fn health(&self) -> ComponentHealth {
        let results = self.check_health().await;
        let detail = results
            .iter()
            .map(|(name, ok)| format!("{}={}", name, if *ok { "up" } else { "down" }))
            .collect::<Vec<_>>()
            .join(", ");

        let status = if results.iter().any(|(_, ok)| *ok) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        ComponentHealth {
            name: "generation".to_string(),
            status,
            detail: if detail.is_empty() {
                Some("no providers configured".to_string())
            } else {
                Some(detail)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mock provider for testing
    struct MockProvider {
        name: String,
        is_local: bool,
        cost_per_1k: f64,
    }

    impl MockProvider {
        fn new(name: &str, is_local: bool, cost_per_1k: f64) -> Self {
            Self {
                name: name.to_string(),
                is_local,
                cost_per_1k,
            }
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "mock"
        }

        fn is_local(&self) -> bool {
            self.is_local
        }

        fn estimated_cost(&self, tokens: usize) -> f64 {
            (tokens as f64 / 1000.0) * self.cost_per_1k
        }

        async fn complete(&self, _request: &GenerationRequest) -> super::super::Result<String> {
            Err(LLMError::Unknown("mock".into()))
        }
    }

    fn create_test_config(default_provider: &str) -> Arc<LLMConfig> {
        Arc::new(LLMConfig {
            default_provider: default_provider.to_string(),
            ..LLMConfig::default()
        })
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_prompt: "s".repeat(400),
            user_prompt: "u".repeat(400),
            max_tokens: 500,
            temperature: 0.7,
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(LLMRouter::estimate_tokens(&request()), 700);
    }

    #[test]
    fn test_default_provider_ranks_first() {
        let router = LLMRouter::new(
            vec![
                Box::new(MockProvider::new("ollama", true, 0.0)),
                Box::new(MockProvider::new("anthropic", false, 0.003)),
                Box::new(MockProvider::new("openai", false, 0.002)),
            ],
            create_test_config("anthropic"),
        );

        let ranked: Vec<&str> = router.rank_providers(1000).iter().map(|p| p.name()).collect();
        assert_eq!(ranked, vec!["anthropic", "ollama", "openai"]);
    }

    #[test]
    fn test_model_chain() {
        let router = LLMRouter::new(
            vec![
                Box::new(MockProvider::new("ollama", true, 0.0)),
                Box::new(MockProvider::new("openai", false, 0.002)),
            ],
            create_test_config("openai"),
        );
        assert_eq!(router.model(), "openai:mock -> ollama:mock");
    }

    #[tokio::test]
    async fn test_empty_router_is_exhausted() {
        let router = LLMRouter::new(vec![], create_test_config("openai"));
        let err = router.generate(&request()).await.unwrap_err();
        assert!(matches!(err, EngineError::AllProvidersExhausted));

        let health = router.health().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_failing_providers_exhaust() {
        let router = LLMRouter::new(
            vec![Box::new(MockProvider::new("openai", false, 0.002))],
            create_test_config("openai"),
        );
        let err = router.generate(&request()).await.unwrap_err();
        assert!(matches!(err, EngineError::AllProvidersExhausted));
    }
}
