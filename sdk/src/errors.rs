//! Error types and handling
//!
//! This module provides the error types used throughout the Parley engine.
//! All errors implement the `ParleyErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! All error messages are scrubbed to ensure:
//! - No secrets (API keys, tokens) are included
//! - No file paths are exposed to remote users
//! - All messages are safe to display to end users

use thiserror::Error;

/// Trait for Parley error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait ParleyErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets, file paths or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require manual intervention or a configuration change.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// Every port (retrieval, generation, memory write) reports failures with
/// this type. The orchestrator absorbs most of them; see [`TurnError`] for
/// the one kind that ends a turn.
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database**: SQLite operation failures
/// - **LLM Provider**: API failures, authentication errors, timeouts
/// - **Retrieval**: Memory search and web search failures
/// - **Runtime**: Scheduler construction failures in the blocking bridge
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ParleyErrorExt};
///
/// let error = EngineError::Search("connection refused".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::AllProvidersExhausted;
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("All LLM providers exhausted")]
    AllProvidersExhausted,

    #[error("LLM call timed out")]
    LLMTimeout,

    // Retrieval errors
    #[error("Web search error: {0}")]
    Search(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    // Execution errors
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParleyErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Database(_) => "Database operation failed. Check the data directory",

            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",
            Self::AllProvidersExhausted => "No LLM providers available. Check configuration",
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",

            Self::Search(_) => "Web search is unavailable. Answers may be less current",
            Self::Memory(_) => "Conversation memory is unavailable. Answers may lack context",
            Self::Retrieval(_) => "Context retrieval failed. Answers may lack context",

            Self::Runtime(_) => "The engine could not schedule the request. Try again",
            Self::InvalidInput(_) => "The message could not be processed. Check its contents",

            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::AllProvidersExhausted | Self::Config(_) => false,
            _ => true,
        }
    }
}

/// The single failure kind that ends a turn early.
///
/// Retrieval, generation and persistence failures are absorbed where they
/// happen. Anything else surfaces as a `TurnError`, which the orchestrator
/// converts into the `error` field of its response rather than propagating.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("context assembly failed: {0}")]
    Assembly(String),

    #[error("pipeline panicked: {0}")]
    Panicked(String),

    #[error("scheduler unavailable: {0}")]
    Scheduler(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_hints_do_not_leak_details() {
        let error = EngineError::LLMProvider("sk-secret-key rejected".to_string());
        assert!(!error.user_hint().contains("sk-"));

        let error = EngineError::Database("/home/user/.parley/memory.db locked".to_string());
        assert!(!error.user_hint().contains("/home"));
    }

    #[test]
    fn test_recoverability() {
        assert!(EngineError::LLMTimeout.is_recoverable());
        assert!(EngineError::Search("503".into()).is_recoverable());
        assert!(!EngineError::AllProvidersExhausted.is_recoverable());
        assert!(!EngineError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_turn_error_display() {
        let err = TurnError::InvalidInput("user message is empty".into());
        assert_eq!(err.to_string(), "invalid input: user message is empty");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
