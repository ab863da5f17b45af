//! Service wiring
//!
//! Builds every long-lived component from `Config` exactly once: database,
//! memory store, web search, LLM providers and router, retriever,
//! orchestrator and conversation service. Components are shared as `Arc`s
//! and handed to whichever surface (CLI or HTTP) is running.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::db::{Database, MemoryStore};
use crate::llm::{AnthropicProvider, LLMProvider, LLMRouter, OllamaProvider, OpenAIProvider};
use crate::rag::{CompositeRetriever, ConversationService, Orchestrator};
use crate::search;
use crate::secrets::{SecretCache, SecretManager, SERVICE_NAME};

/// Everything a surface needs to serve turns.
pub struct Services {
    pub database: Database,
    pub memory: MemoryStore,
    pub orchestrator: Arc<Orchestrator>,
    pub conversation: ConversationService,
}

impl Services {
    /// Build all components from config.
    pub async fn build(config: &Config) -> Result<Self> {
        let database = Database::new(&config.memory_db_path())
            .await
            .context("Failed to open memory database")?;
        let memory = database.memory();

        let secret_manager = Arc::new(SecretManager::new(SERVICE_NAME));
        let secret_cache = Arc::new(SecretCache::new(Arc::clone(&secret_manager)));

        let providers = build_providers(config, &secret_manager, &secret_cache);
        if providers.is_empty() {
            tracing::warn!("No LLM providers available; answers will use fallback text");
        } else {
            tracing::info!(
                "LLM providers: {}",
                providers
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        let router = Arc::new(LLMRouter::new(providers, Arc::new(config.llm.clone())));

        let web_search: Arc<dyn search::WebSearch> = Arc::from(search::from_config(&config.search));
        let retriever = Arc::new(CompositeRetriever::new(memory.clone(), web_search));

        let orchestrator = Arc::new(Orchestrator::new(
            retriever,
            router,
            Arc::new(memory.clone()),
        ));
        let conversation = ConversationService::new(Arc::clone(&orchestrator));

        Ok(Self {
            database,
            memory,
            orchestrator,
            conversation,
        })
    }

    /// Flush the database and close it.
    pub async fn shutdown(self) -> Result<()> {
        self.database.close().await
    }
}

/// Register providers: the configured default always, cloud providers
/// whenever their key resolves, Ollama when enabled.
fn build_providers(
    config: &Config,
    secret_manager: &SecretManager,
    secret_cache: &Arc<SecretCache>,
) -> Vec<Box<dyn LLMProvider>> {
    let default = config.llm.default_provider.as_str();
    let mut providers: Vec<Box<dyn LLMProvider>> = Vec::new();

    if default == "openai" || secret_manager.has_secret("openai_api_key") {
        providers.push(Box::new(OpenAIProvider::new(
            config.llm.openai.clone(),
            Arc::clone(secret_cache),
        )));
    }

    if default == "anthropic"
        || config.llm.anthropic.enabled
        || secret_manager.has_secret("anthropic_api_key")
    {
        providers.push(Box::new(AnthropicProvider::new(
            config.llm.anthropic.clone(),
            Arc::clone(secret_cache),
        )));
    }

    if default == "ollama" || config.llm.ollama.enabled {
        providers.push(Box::new(OllamaProvider::new(
            config.llm.ollama.base_url.clone(),
            config.llm.ollama.model.clone(),
        )));
    }

    providers
}
