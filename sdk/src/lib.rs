//! Parley SDK
//!
//! Shared library providing the turn data model, port traits and error types.
//! This crate is used by the engine and by the HTTP surface.

/// Error types and handling
pub mod errors;

/// Port traits implemented by retrieval, generation and memory collaborators
pub mod ports;

/// Turn data model and wire types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ParleyErrorExt, TurnError};
pub use ports::{GenerationPort, MemoryWritePort, RetrievalPort};
pub use types::{
    ComponentHealth, GenerationRequest, HealthStatus, Metadata, RetrievalHealth, RetrievalResult,
    StepOutcome, TurnRecord, TurnRequest, TurnResponse, WebResult, WireEvent, APOLOGY_TEXT,
    INTERNAL_FACT_PREFIX,
};
