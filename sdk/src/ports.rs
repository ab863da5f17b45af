//! Port traits
//!
//! The orchestrator talks to its collaborators only through these traits.
//! Implementations are constructed once per process and shared as
//! `Arc<dyn ...>` across concurrent turns, so every port must be
//! `Send + Sync` and safe for simultaneous use.

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::types::{ComponentHealth, GenerationRequest, RetrievalHealth, RetrievalResult, TurnRecord};

/// Gathers memory snippets, facts and web results for a query.
#[async_trait]
pub trait RetrievalPort: Send + Sync {
    /// Retrieve context for `query`, returning at most `cap` items per source.
    ///
    /// Implementations combine several sources; one failing source should
    /// contribute nothing rather than fail the call.
    async fn retrieve(
        &self,
        query: &str,
        cap: usize,
        user_id: Option<i64>,
        agent_id: Option<i64>,
    ) -> Result<RetrievalResult, EngineError>;

    /// Health of the memory and web-search sources.
    async fn health(&self) -> RetrievalHealth;

    /// Source statistics for diagnostics.
    async fn stats(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Produces the assistant's answer.
#[async_trait]
pub trait GenerationPort: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError>;

    /// Name of the model (or model chain) answering.
    fn model(&self) -> String;

    async fn health(&self) -> ComponentHealth;
}

/// Durable conversation memory.
#[async_trait]
pub trait MemoryWritePort: Send + Sync {
    /// Append one exchange. Returns whether it was stored.
    async fn persist(&self, record: &TurnRecord) -> Result<bool, EngineError>;

    /// Wipe memory for `user_id`, or everything when `None`.
    async fn clear(&self, user_id: Option<i64>) -> Result<bool, EngineError>;
}
