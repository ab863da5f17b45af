//! Hand-written port fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parley_engine::rag::{ConversationService, Orchestrator, StreamingAdapter};
use sdk::errors::EngineError;
use sdk::ports::{GenerationPort, MemoryWritePort, RetrievalPort};
use sdk::types::{
    ComponentHealth, GenerationRequest, RetrievalHealth, RetrievalResult, TurnRecord, WebResult,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub enum RetrievalBehavior {
    Return(RetrievalResult),
    Fail(String),
    Panic(String),
}

pub struct FakeRetrieval {
    pub behavior: RetrievalBehavior,
    pub search_health: ComponentHealth,
}

impl FakeRetrieval {
    pub fn returning(result: RetrievalResult) -> Self {
        Self {
            behavior: RetrievalBehavior::Return(result),
            search_health: ComponentHealth::healthy("search"),
        }
    }

    pub fn empty() -> Self {
        Self::returning(RetrievalResult::empty())
    }

    pub fn with_memories(memories: &[&str]) -> Self {
        let mut result = RetrievalResult::empty();
        result.memories = memories.iter().map(|m| m.to_string()).collect();
        result.sources = vec!["memory".to_string()];
        Self::returning(result)
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            behavior: RetrievalBehavior::Fail(reason.to_string()),
            search_health: ComponentHealth::healthy("search"),
        }
    }

    pub fn panicking() -> Self {
        Self::panicking_with("retrieval exploded")
    }

    pub fn panicking_with(message: &str) -> Self {
        Self {
            behavior: RetrievalBehavior::Panic(message.to_string()),
            search_health: ComponentHealth::healthy("search"),
        }
    }

    pub fn with_search_health(mut self, health: ComponentHealth) -> Self {
        self.search_health = health;
        self
    }
}

#[async_trait]
impl RetrievalPort for FakeRetrieval {
    async fn retrieve(
        &self,
        _query: &str,
        _cap: usize,
        _user_id: Option<i64>,
        _agent_id: Option<i64>,
    ) -> Result<RetrievalResult, EngineError> {
        match &self.behavior {
            RetrievalBehavior::Return(result) => Ok(result.clone()),
            RetrievalBehavior::Fail(reason) => Err(EngineError::Retrieval(reason.clone())),
            RetrievalBehavior::Panic(message) => panic!("{}", message),
        }
    }

    async fn health(&self) -> RetrievalHealth {
        RetrievalHealth {
            memory: ComponentHealth::healthy("memory"),
            search: self.search_health.clone(),
        }
    }
}

pub struct FakeGeneration {
    pub reply: Result<String, String>,
    pub delay: Option<Duration>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub healthy: bool,
}

impl FakeGeneration {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
            healthy: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationPort for FakeGeneration {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(EngineError::LLMProvider)
    }

    fn model(&self) -> String {
        "fake:model".to_string()
    }

    async fn health(&self) -> ComponentHealth {
        if self.healthy {
            ComponentHealth::healthy("generation")
        } else {
            ComponentHealth::unhealthy("generation", "no provider reachable")
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum MemoryBehavior {
    Store,
    Decline,
    Fail,
}

pub struct FakeMemory {
    pub behavior: MemoryBehavior,
    pub records: Mutex<Vec<TurnRecord>>,
    pub cleared: Mutex<Vec<Option<i64>>>,
}

impl FakeMemory {
    pub fn new(behavior: MemoryBehavior) -> Self {
        Self {
            behavior,
            records: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
        }
    }

    pub fn stored(&self) -> Vec<TurnRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryWritePort for FakeMemory {
    async fn persist(&self, record: &TurnRecord) -> Result<bool, EngineError> {
        match self.behavior {
            MemoryBehavior::Store => {
                self.records.lock().unwrap().push(record.clone());
                Ok(true)
            }
            MemoryBehavior::Decline => Ok(false),
            MemoryBehavior::Fail => Err(EngineError::Memory("disk full".to_string())),
        }
    }

    async fn clear(&self, user_id: Option<i64>) -> Result<bool, EngineError> {
        self.cleared.lock().unwrap().push(user_id);
        match self.behavior {
            MemoryBehavior::Fail => Err(EngineError::Memory("disk full".to_string())),
            _ => Ok(true),
        }
    }
}

/// An orchestrator plus handles on its fakes.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub generation: Arc<FakeGeneration>,
    pub memory: Arc<FakeMemory>,
}

impl Harness {
    pub fn new(retrieval: FakeRetrieval, generation: FakeGeneration, memory: FakeMemory) -> Self {
        let generation = Arc::new(generation);
        let memory = Arc::new(memory);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(retrieval),
            Arc::clone(&generation) as Arc<dyn GenerationPort>,
            Arc::clone(&memory) as Arc<dyn MemoryWritePort>,
        ));
        Self {
            orchestrator,
            generation,
            memory,
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(
            FakeRetrieval::empty(),
            FakeGeneration::replying(text),
            FakeMemory::new(MemoryBehavior::Store),
        )
    }

    /// Streaming adapter with no pacing so tests run fast.
    pub fn adapter(&self) -> StreamingAdapter {
        StreamingAdapter::new(Arc::clone(&self.orchestrator)).with_chunk_delay(Duration::ZERO)
    }

    pub fn service(&self) -> ConversationService {
        ConversationService::with_adapter(self.adapter())
    }
}

pub fn web_result(title: &str, snippet: &str, url: &str) -> WebResult {
    WebResult::new(title, snippet).with_url(url)
}
