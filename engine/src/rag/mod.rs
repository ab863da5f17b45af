//! Retrieval-augmented turn processing
//!
//! - [`orchestrator`]: the turn pipeline over the three ports
//! - [`stream`]: wire-event streaming of a turn
//! - [`bridge`]: blocking entry points for synchronous callers
//! - [`context`]: prompt and context rendering
//! - [`retrieval`]: the memory + facts + web retriever
//! - [`service`]: conversation ids, response envelope, SSE framing

pub mod bridge;
pub mod context;
pub mod orchestrator;
pub mod retrieval;
pub mod service;
pub mod stream;

pub use bridge::{block_on_isolated, BlockingEvents};
pub use orchestrator::{aggregate_health, HealthReport, Orchestrator};
pub use retrieval::CompositeRetriever;
pub use service::{ChatEnvelope, ClearMemoryResult, ConversationService};
pub use stream::{chunk_text, EventStream, StreamingAdapter};
