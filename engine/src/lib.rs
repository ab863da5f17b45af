//! Parley Engine Library
//!
//! This library provides the retrieval-augmented conversation engine.
//! It is used by the `parley` binary, the HTTP server and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Secret management module
pub mod secrets;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Web search sources
pub mod search;

/// Turn pipeline: orchestration, streaming and the blocking bridge
pub mod rag;

/// Component wiring shared by the CLI and the HTTP server
pub mod services;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
