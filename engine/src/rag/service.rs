//! Caller-facing conversation service
//!
//! Adds what an API consumer needs on top of the orchestrator: a
//! conversation id when the caller has none, the JSON response envelope,
//! SSE framing, and service-level stats and health.

use futures::stream::Stream;
use sdk::types::{Metadata, TurnRequest, TurnResponse};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;

use super::orchestrator::{HealthReport, Orchestrator};
use super::stream::{EventStream, StreamingAdapter};

pub const SERVICE_NAME: &str = "Parley Conversation Service";

/// Per-turn numbers reported alongside the answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMetadata {
    pub sources: Vec<String>,
    pub memory_used: usize,
    pub web_results: usize,
    pub facts_retrieved: usize,
    pub processing_time: f64,
    pub rag_metadata: Metadata,
    pub user_id: Option<i64>,
    pub digital_human_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatData {
    pub message: String,
    pub conversation_id: String,
    pub timestamp: String,
    pub metadata: ChatMetadata,
}

/// Non-streaming response body.
///
/// `success` is false exactly when `error` is set; `data.message` always
/// holds readable text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEnvelope {
    pub success: bool,
    pub data: ChatData,
    pub error: Option<String>,
}

impl ChatEnvelope {
    pub fn from_response(
        response: TurnResponse,
        user_id: Option<i64>,
        agent_id: Option<i64>,
        timestamp: String,
    ) -> Self {
        Self {
            success: response.error.is_none(),
            data: ChatData {
                message: response.response_text,
                conversation_id: response.conversation_id.unwrap_or_default(),
                timestamp,
                metadata: ChatMetadata {
                    sources: response.sources,
                    memory_used: response.memory_used_count,
                    web_results: response.web_result_count,
                    facts_retrieved: response.facts_retrieved_count,
                    processing_time: response.processing_time_seconds,
                    rag_metadata: response.metadata,
                    user_id,
                    digital_human_id: agent_id,
                },
            },
            error: response.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearMemoryResult {
    pub success: bool,
    pub message: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: sdk::types::HealthStatus,
    pub service_name: &'static str,
    pub rag_service: HealthReport,
    pub features_available: bool,
}

#[derive(Clone)]
pub struct ConversationService {
    adapter: StreamingAdapter,
}

impl ConversationService {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self::with_adapter(StreamingAdapter::new(orchestrator))
    }

    pub fn with_adapter(adapter: StreamingAdapter) -> Self {
        Self { adapter }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        self.adapter.orchestrator()
    }

    /// Give the request a fresh UUID v4 conversation id if it has none.
    pub fn ensure_conversation_id(mut request: TurnRequest) -> TurnRequest {
        let missing = request
            .conversation_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty());
        if missing {
            request.conversation_id = Some(uuid::Uuid::new_v4().to_string());
        }
        request
    }

    fn envelope(request: &TurnRequest, response: TurnResponse) -> ChatEnvelope {
        ChatEnvelope::from_response(
            response,
            request.user_id,
            request.agent_id,
            chrono::Utc::now().to_rfc3339(),
        )
    }

    pub async fn process_message(&self, request: TurnRequest) -> ChatEnvelope {
        let request = Self::ensure_conversation_id(request);
        let response = self.orchestrator().process_turn(&request).await;
        Self::envelope(&request, response)
    }

    /// Blocking twin of [`ConversationService::process_message`].
    pub fn process_message_blocking(&self, request: TurnRequest) -> ChatEnvelope {
        let request = Self::ensure_conversation_id(request);
        let response = self.orchestrator().process_turn_blocking(&request);
        Self::envelope(&request, response)
    }

    /// Stream the answer as wire events.
    pub fn stream_events(&self, request: TurnRequest) -> EventStream {
        self.adapter
            .stream_turn(Self::ensure_conversation_id(request))
    }

    /// Stream the answer as ready-to-write SSE frames.
    pub fn stream_response(
        &self,
        request: TurnRequest,
    ) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        self.adapter
            .stream_sse(Self::ensure_conversation_id(request))
    }

    /// Blocking iterator over the streamed answer.
    pub fn stream_events_blocking(&self, request: TurnRequest) -> super::bridge::BlockingEvents {
        self.adapter
            .stream_turn_blocking(Self::ensure_conversation_id(request))
    }

    pub async fn clear_memory(&self, user_id: Option<i64>) -> ClearMemoryResult {
        let success = self.orchestrator().clear_memory(user_id).await;
        ClearMemoryResult {
            success,
            message: if success {
                "Memory cleared successfully".to_string()
            } else {
                "Failed to clear memory".to_string()
            },
            user_id,
        }
    }

    pub async fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "service_name": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "commit": env!("GIT_COMMIT_HASH"),
            "rag_pipeline": true,
            "features": [
                "RAG-enhanced responses",
                "Memory persistence",
                "Web search integration",
                "Streaming support",
                "Multi-user support",
                "Digital human integration",
            ],
            "rag_service": self.orchestrator().stats().await,
        })
    }

    pub async fn health_check(&self) -> ServiceHealth {
        let report = self.orchestrator().health_check().await;
        ServiceHealth {
            status: report.status,
            service_name: SERVICE_NAME,
            features_available: report.capabilities_available,
            rag_service: report,
        }
    }
}
