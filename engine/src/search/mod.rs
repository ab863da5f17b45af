//! Web search
//!
//! Retrieval asks a `WebSearch` for recent information about the user's
//! message. `SearxngSearch` talks to a SearXNG instance over its JSON API;
//! `DisabledSearch` stands in when search is turned off in config.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{ComponentHealth, WebResult};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::SearchConfig;

#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Search the web, returning at most `limit` results in provider order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>, EngineError>;

    async fn health(&self) -> ComponentHealth;

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({ "provider": self.name() })
    }
}

/// Search that always returns nothing.
pub struct DisabledSearch;

#[async_trait]
impl WebSearch for DisabledSearch {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<WebResult>, EngineError> {
        Ok(Vec::new())
    }

    async fn health(&self) -> ComponentHealth {
        ComponentHealth::healthy("search").with_detail("web search disabled")
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({ "provider": "disabled", "enabled": false })
    }
}

/// SearXNG JSON API client
pub struct SearxngSearch {
    base_url: String,
    max_results: usize,
    client: reqwest::Client,
    searches: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
}

impl SearxngSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            searches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<WebResult>, EngineError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| EngineError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Search(format!(
                "SearXNG returned {}",
                response.status()
            )));
        }

        let body: SearxngResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Search(format!("Failed to parse SearXNG response: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .filter(|r| !r.title.is_empty() || !r.content.is_empty())
            .take(limit.min(self.max_results))
            .map(|r| WebResult {
                title: r.title,
                snippet: r.content,
                url: r.url.filter(|u| !u.is_empty()),
            })
            .collect())
    }
}

#[async_trait]
impl WebSearch for SearxngSearch {
    fn name(&self) -> &str {
        "searxng"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>, EngineError> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let result = self.fetch(query, limit).await;
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn health(&self) -> ComponentHealth {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => ComponentHealth::healthy("search"),
            Ok(response) => ComponentHealth::unhealthy(
                "search",
                format!("SearXNG returned {}", response.status()),
            ),
            Err(e) => ComponentHealth::unhealthy("search", e.to_string()),
        }
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "searxng",
            "enabled": true,
            "base_url": self.base_url,
            "searches": self.searches.load(Ordering::Relaxed),
            "failures": self.failures.load(Ordering::Relaxed),
        })
    }
}

/// Build the search backend described by config.
pub fn from_config(config: &SearchConfig) -> Box<dyn WebSearch> {
    if config.enabled {
        Box::new(SearxngSearch::new(config))
    } else {
        Box::new(DisabledSearch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_search_is_empty_and_healthy() {
        let search = DisabledSearch;
        assert!(search.search("rust", 3).await.unwrap().is_empty());
        assert!(search.health().await.is_healthy());
        assert_eq!(search.stats()["enabled"], false);
    }

    #[test]
    fn test_from_config_respects_enabled_flag() {
        let mut config = SearchConfig::default();
        assert_eq!(from_config(&config).name(), "disabled");

        config.enabled = true;
        assert_eq!(from_config(&config).name(), "searxng");
    }
}
