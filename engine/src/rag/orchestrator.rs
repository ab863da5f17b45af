//! Turn orchestration
//!
//! One turn runs strictly in order: admit the message, retrieve context,
//! assemble the prompt, generate, persist, respond. Retrieval, generation
//! and persistence are best-effort: their failures are absorbed into a
//! degraded but valid answer. Only an inadmissible message or a panic
//! inside the pipeline fails the turn, and even then the caller gets a
//! `TurnResponse` rather than an `Err`.

use futures::FutureExt;
use sdk::errors::TurnError;
use sdk::ports::{GenerationPort, MemoryWritePort, RetrievalPort};
use sdk::types::{
    ComponentHealth, HealthStatus, RetrievalResult, StepOutcome, TurnRecord, TurnRequest,
    TurnResponse,
};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::context;
use crate::secrets::scrub;

/// Round seconds to two decimals.
pub fn round_seconds(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Best-effort text from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Combine component health into one status.
///
/// Generation down together with search down is unhealthy. Any single
/// problem (memory not healthy, search unhealthy, or generation down) is
/// degraded.
pub fn aggregate_health(
    memory: &ComponentHealth,
    search: &ComponentHealth,
    generation: &ComponentHealth,
) -> HealthStatus {
    let generation_up = generation.is_healthy();
    let search_down = search.status == HealthStatus::Unhealthy;

    if !generation_up && search_down {
        HealthStatus::Unhealthy
    } else if !memory.is_healthy() || search_down || !generation_up {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthComponents {
    pub memory: ComponentHealth,
    pub search: ComponentHealth,
    pub generation: ComponentHealth,
}

/// Result of `Orchestrator::health_check`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: HealthComponents,
    pub model: String,
    pub capabilities_available: bool,
}

/// The turn pipeline and its three collaborators.
pub struct Orchestrator {
    retrieval: Arc<dyn RetrievalPort>,
    generation: Arc<dyn GenerationPort>,
    memory: Arc<dyn MemoryWritePort>,
}

impl Orchestrator {
    pub fn new(
        retrieval: Arc<dyn RetrievalPort>,
        generation: Arc<dyn GenerationPort>,
        memory: Arc<dyn MemoryWritePort>,
    ) -> Self {
        Self {
            retrieval,
            generation,
            memory,
        }
    }

    /// Run one turn.
    ///
    /// Never panics and never fails: every outcome, including a panic in a
    /// port, comes back as a `TurnResponse`.
    pub async fn process_turn(&self, request: &TurnRequest) -> TurnResponse {
        let started = Instant::now();
        let conversation_id = request.conversation_id.clone();

        info!(
            conversation_id = conversation_id.as_deref().unwrap_or("-"),
            user_id = ?request.user_id,
            agent_id = ?request.agent_id,
            "Processing turn"
        );

        let outcome = AssertUnwindSafe(self.run_pipeline(request, started))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(TurnError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(response) => {
                info!(
                    conversation_id = conversation_id.as_deref().unwrap_or("-"),
                    processing_time = response.processing_time_seconds,
                    memory_used = response.memory_used_count,
                    web_results = response.web_result_count,
                    "Turn completed"
                );
                response
            }
            Err(err) => {
                let elapsed = round_seconds(started.elapsed().as_secs_f64());
                error!(
                    conversation_id = conversation_id.as_deref().unwrap_or("-"),
                    "RAG processing failed: {}",
                    scrub(&err.to_string())
                );
                let mut response = TurnResponse::failure(&err, conversation_id, elapsed);
                response.error = response.error.map(|error| scrub(&error));
                response
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &TurnRequest,
        started: Instant,
    ) -> Result<TurnResponse, TurnError> {
        let mut degraded: Vec<String> = Vec::new();

        Self::admit(request).into_parts()?;

        let (retrieval, reason) = self.retrieve(request).await.into_parts()?;
        degraded.extend(reason);

        let context_text = context::assemble_context(&retrieval);
        let generation_request = context::build_generation_request(request, &context_text);

        let (response_text, reason) = self
            .generate(&generation_request, request, &retrieval)
            .await
            .into_parts()?;
        degraded.extend(reason);

        let record = TurnRecord {
            user_message: request.user_message.clone(),
            assistant_response: response_text.clone(),
            context: context_text,
            conversation_id: request.conversation_id.clone(),
            user_id: request.user_id,
            agent_id: request.agent_id,
        };
        let ((), reason) = self.persist(&record).await.into_parts()?;
        degraded.extend(reason);

        let mut metadata = retrieval.metadata;
        if !degraded.is_empty() {
            let reasons: Vec<serde_json::Value> = degraded
                .iter()
                .map(|reason| serde_json::Value::String(scrub(reason)))
                .collect();
            metadata.insert("degraded".to_string(), serde_json::Value::Array(reasons));
        }

        Ok(TurnResponse {
            response_text,
            sources: retrieval.sources,
            memory_used_count: retrieval.memories.len(),
            web_result_count: retrieval.web_results.len(),
            facts_retrieved_count: retrieval.facts.len(),
            processing_time_seconds: round_seconds(started.elapsed().as_secs_f64()),
            metadata,
            conversation_id: request.conversation_id.clone(),
            error: None,
        })
    }

    /// Reject messages with nothing to answer.
    fn admit(request: &TurnRequest) -> StepOutcome<()> {
        if request.user_message.trim().is_empty() {
            StepOutcome::Fatal(TurnError::InvalidInput(
                "user message is empty".to_string(),
            ))
        } else {
            StepOutcome::Success(())
        }
    }

    async fn retrieve(&self, request: &TurnRequest) -> StepOutcome<RetrievalResult> {
        match self
            .retrieval
            .retrieve(
                &request.user_message,
                context::RETRIEVAL_CAP,
                request.user_id,
                request.agent_id,
            )
            .await
        {
            Ok(result) => StepOutcome::Success(result),
            Err(e) => {
                let reason = format!("retrieval failed: {}", e);
                warn!("{}", scrub(&reason));
                StepOutcome::degraded(RetrievalResult::empty(), reason)
            }
        }
    }

    async fn generate(
        &self,
        generation_request: &sdk::types::GenerationRequest,
        request: &TurnRequest,
        retrieval: &RetrievalResult,
    ) -> StepOutcome<String> {
        match self.generation.generate(generation_request).await {
            Ok(text) => StepOutcome::Success(text),
            Err(e) => {
                let reason = format!("generation failed: {}", e);
                warn!("{}", scrub(&reason));
                StepOutcome::degraded(
                    context::fallback_response(
                        &request.user_message,
                        !retrieval.memories.is_empty(),
                    ),
                    reason,
                )
            }
        }
    }

    async fn persist(&self, record: &TurnRecord) -> StepOutcome<()> {
        match self.memory.persist(record).await {
            Ok(true) => StepOutcome::Success(()),
            Ok(false) => {
                warn!("Memory store declined the exchange");
                StepOutcome::degraded((), "persistence skipped")
            }
            Err(e) => {
                let reason = format!("persistence failed: {}", e);
                warn!("{}", scrub(&reason));
                StepOutcome::degraded((), reason)
            }
        }
    }

    /// Model chain and retrieval source statistics.
    pub async fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "service_name": "RAG Service",
            "model": self.generation.model(),
            "retrieval": self.retrieval.stats().await,
            "capabilities": [
                "Natural conversation",
                "Memory of past conversations",
                "Fact storage",
                "Web search for current information",
                "Streaming responses",
            ],
        })
    }

    /// Probe every dependency and combine the results.
    pub async fn health_check(&self) -> HealthReport {
        let (retrieval, generation) =
            futures::join!(self.retrieval.health(), self.generation.health());

        let status = aggregate_health(&retrieval.memory, &retrieval.search, &generation);

        HealthReport {
            status,
            components: HealthComponents {
                memory: retrieval.memory,
                search: retrieval.search,
                generation,
            },
            model: self.generation.model(),
            capabilities_available: status != HealthStatus::Unhealthy,
        }
    }

    /// Wipe memory for `user_id`, or all memory when `None`.
    pub async fn clear_memory(&self, user_id: Option<i64>) -> bool {
        match self.memory.clear(user_id).await {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!("Failed to clear memory: {}", scrub(&e.to_string()));
                false
            }
        }
    }
}
