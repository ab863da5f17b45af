//! Composite retrieval
//!
//! Queries conversation memory, stored facts and web search concurrently.
//! A failing source contributes nothing and leaves a `<source>_error` note
//! in the result metadata, so `retrieve` always returns `Ok`.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::ports::RetrievalPort;
use sdk::types::{Metadata, RetrievalHealth, RetrievalResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::db::MemoryStore;
use crate::search::WebSearch;
use crate::secrets::scrub;

pub struct CompositeRetriever {
    memory: MemoryStore,
    search: Arc<dyn WebSearch>,
}

impl CompositeRetriever {
    pub fn new(memory: MemoryStore, search: Arc<dyn WebSearch>) -> Self {
        Self { memory, search }
    }
}

fn note_failure(metadata: &mut Metadata, source: &str, error: &dyn std::fmt::Display) {
    let message = scrub(&error.to_string());
    warn!(source, "Retrieval source failed: {}", message);
    metadata.insert(format!("{}_error", source), Value::String(message));
}

#[async_trait]
impl RetrievalPort for CompositeRetriever {
    async fn retrieve(
        &self,
        query: &str,
        cap: usize,
        user_id: Option<i64>,
        agent_id: Option<i64>,
    ) -> Result<RetrievalResult, EngineError> {
        let (memories, facts, web) = futures::join!(
            self.memory.search(query, cap, user_id, agent_id),
            self.memory.facts(user_id),
            self.search.search(query, cap),
        );

        let mut result = RetrievalResult::empty();

        match memories {
            Ok(memories) => result.memories = memories,
            Err(e) => note_failure(&mut result.metadata, "memory", &format!("{:#}", e)),
        }
        match facts {
            Ok(facts) => result.facts = facts,
            Err(e) => note_failure(&mut result.metadata, "facts", &format!("{:#}", e)),
        }
        match web {
            Ok(web_results) => result.web_results = web_results,
            Err(e) => note_failure(&mut result.metadata, "web_search", &e),
        }

        if !result.memories.is_empty() {
            result.sources.push("memory".to_string());
        }
        if !result.facts.is_empty() {
            result.sources.push("facts".to_string());
        }
        for web_result in &result.web_results {
            let label = web_result
                .url
                .clone()
                .unwrap_or_else(|| "web_search".to_string());
            if !result.sources.contains(&label) {
                result.sources.push(label);
            }
        }

        if let Some(user_id) = user_id {
            result.metadata.insert("user_id".to_string(), Value::from(user_id));
        }
        if let Some(agent_id) = agent_id {
            result
                .metadata
                .insert("digital_human_id".to_string(), Value::from(agent_id));
        }

        Ok(result)
    }

    async fn health(&self) -> RetrievalHealth {
        let (memory, search) = futures::join!(self.memory.health(), self.search.health());
        RetrievalHealth { memory, search }
    }

    async fn stats(&self) -> Value {
        let memory = match self.memory.stats().await {
            Ok(stats) => serde_json::to_value(stats).unwrap_or(Value::Null),
            Err(e) => serde_json::json!({ "error": scrub(&format!("{:#}", e)) }),
        };

        serde_json::json!({
            "memory": memory,
            "search": self.search.stats(),
        })
    }
}
