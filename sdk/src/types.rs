//! Turn data model and wire types
//!
//! Everything that crosses a component boundary during one turn lives here:
//! the request, what retrieval found, what the model is asked, what gets
//! persisted, the response, and the streaming wire events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::TurnError;

/// User-visible text returned whenever a turn fails.
pub const APOLOGY_TEXT: &str =
    "I apologize, but I encountered an error processing your message. Please try again.";

/// Facts whose key starts with this marker are bookkeeping and never reach a prompt.
pub const INTERNAL_FACT_PREFIX: &str = "_";

/// Free-form metadata attached to retrieval results and responses.
///
/// A `BTreeMap` keeps serialization order stable across runs.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Input for one turn. Created per call and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub user_message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    /// Identifier of the agent persona ("digital human") answering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<i64>,

    /// Overrides the built-in system prompt when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl TurnRequest {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_agent_id(mut self, agent_id: i64) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// One web-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl WebResult {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Everything retrieval found for a query. Every field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Memory snippets, most relevant first
    #[serde(default)]
    pub memories: Vec<String>,

    #[serde(default)]
    pub facts: BTreeMap<String, String>,

    /// Web hits, in provider ranking order
    #[serde(default)]
    pub web_results: Vec<WebResult>,

    /// Provenance labels
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no memory, fact or web result was found.
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty() && self.facts.is_empty() && self.web_results.is_empty()
    }

    /// Facts that may be shown to the model, in key order.
    pub fn visible_facts(&self) -> impl Iterator<Item = (&String, &String)> {
        self.facts
            .iter()
            .filter(|(key, _)| !key.starts_with(INTERNAL_FACT_PREFIX))
    }
}

/// What the generation port is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// One exchange as handed to the memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub user_message: String,
    pub assistant_response: String,
    /// The assembled context the answer was generated from
    pub context: String,
    pub conversation_id: Option<String>,
    pub user_id: Option<i64>,
    pub agent_id: Option<i64>,
}

/// Result of one turn.
///
/// Built only through [`TurnResponse::failure`] or by the orchestrator's
/// success path, so `error.is_some()` always comes with [`APOLOGY_TEXT`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub response_text: String,
    pub sources: Vec<String>,
    pub memory_used_count: usize,
    pub web_result_count: usize,
    pub facts_retrieved_count: usize,
    pub processing_time_seconds: f64,
    pub metadata: Metadata,
    pub conversation_id: Option<String>,
    pub error: Option<String>,
}

impl TurnResponse {
    /// A failed turn: apology text, zero counts, descriptive error.
    pub fn failure(
        error: &TurnError,
        conversation_id: Option<String>,
        processing_time_seconds: f64,
    ) -> Self {
        Self {
            response_text: APOLOGY_TEXT.to_string(),
            sources: Vec::new(),
            memory_used_count: 0,
            web_result_count: 0,
            facts_retrieved_count: 0,
            processing_time_seconds,
            metadata: Metadata::new(),
            conversation_id,
            error: Some(format!("RAG processing failed: {}", error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one best-effort pipeline step.
#[derive(Debug)]
pub enum StepOutcome<T> {
    /// The step did what it was asked
    Success(T),

    /// The step failed but produced a usable stand-in value
    Degraded { value: T, reason: String },

    /// The turn cannot continue
    Fatal(TurnError),
}

impl<T> StepOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    /// Split into the usable value and the degradation reason, if any.
    pub fn into_parts(self) -> Result<(T, Option<String>), TurnError> {
        match self {
            Self::Success(value) => Ok((value, None)),
            Self::Degraded { value, reason } => Ok((value, Some(reason))),
            Self::Fatal(err) => Err(err),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// One unit of the streaming protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Metadata {
        conversation_id: Option<String>,
        sources: Vec<String>,
        memory_used: usize,
        web_results: usize,
        processing_time: f64,
    },
    Chunk {
        content: String,
        chunk_id: usize,
    },
    Complete {
        conversation_id: Option<String>,
        total_chunks: usize,
    },
    Error {
        error: String,
        conversation_id: Option<String>,
    },
}

impl WireEvent {
    /// Render as a Server-Sent Events frame: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }

    pub fn to_json(&self) -> String {
        // Every variant holds only strings, numbers and lists of strings.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","error":"event encoding failed: {}","conversation_id":null}}"#, e)
        })
    }

    /// `complete` and `error` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Health of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Named health report for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            detail: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Health of the two retrieval sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHealth {
    pub memory: ComponentHealth,
    pub search: ComponentHealth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_facts_skip_internal_keys() {
        let mut result = RetrievalResult::empty();
        result.facts.insert("_last_query".into(), "tea".into());
        result.facts.insert("name".into(), "Ada".into());

        let visible: Vec<_> = result.visible_facts().collect();
        assert_eq!(visible, vec![(&"name".to_string(), &"Ada".to_string())]);
    }

    #[test]
    fn test_failure_response_shape() {
        let err = TurnError::InvalidInput("user message is empty".into());
        let response = TurnResponse::failure(&err, Some("c-1".into()), 0.01);

        assert_eq!(response.response_text, APOLOGY_TEXT);
        assert_eq!(response.memory_used_count, 0);
        assert_eq!(response.web_result_count, 0);
        assert_eq!(response.facts_retrieved_count, 0);
        assert_eq!(
            response.error.as_deref(),
            Some("RAG processing failed: invalid input: user message is empty")
        );
        assert!(!response.is_success());
    }

    #[test]
    fn test_step_outcome_parts() {
        let ok: StepOutcome<u8> = StepOutcome::Success(1);
        assert_eq!(ok.into_parts().unwrap(), (1, None));

        let degraded = StepOutcome::degraded(2u8, "search down");
        assert!(degraded.is_degraded());
        assert_eq!(
            degraded.into_parts().unwrap(),
            (2, Some("search down".to_string()))
        );

        let fatal: StepOutcome<u8> = StepOutcome::Fatal(TurnError::Assembly("boom".into()));
        assert!(fatal.into_parts().is_err());
    }

    #[test]
    fn test_wire_event_json_shapes() {
        let chunk = WireEvent::Chunk {
            content: "Hello".into(),
            chunk_id: 0,
        };
        assert_eq!(
            chunk.to_json(),
            r#"{"type":"chunk","content":"Hello","chunk_id":0}"#
        );

        let complete = WireEvent::Complete {
            conversation_id: Some("abc".into()),
            total_chunks: 3,
        };
        assert_eq!(
            complete.to_sse_frame(),
            "data: {\"type\":\"complete\",\"conversation_id\":\"abc\",\"total_chunks\":3}\n\n"
        );
        assert!(complete.is_terminal());
        assert!(!chunk.is_terminal());
    }

    #[test]
    fn test_metadata_event_field_names() {
        let event = WireEvent::Metadata {
            conversation_id: None,
            sources: vec!["memory".into()],
            memory_used: 1,
            web_results: 0,
            processing_time: 0.25,
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "metadata");
        assert_eq!(value["memory_used"], 1);
        assert_eq!(value["web_results"], 0);
        assert_eq!(value["processing_time"], 0.25);
        assert!(value["conversation_id"].is_null());
    }

    #[test]
    fn test_health_status_display() {
        assert_eq!(HealthStatus::Degraded.to_string(), "degraded");
        let json = serde_json::to_string(&HealthStatus::Unhealthy).unwrap();
        assert_eq!(json, "\"unhealthy\"");
    }
}
