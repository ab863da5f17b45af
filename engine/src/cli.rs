//! CLI interface for Parley
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the `parley` binary.

use clap::{Args, Parser, Subcommand};
use sdk::types::TurnRequest;
use std::path::PathBuf;

/// Parley conversation engine
///
/// Answers messages with a language model grounded in conversation memory,
/// stored facts and web search.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Identifiers and overrides for one turn
#[derive(Args, Debug, Clone, Default)]
pub struct TurnArgs {
    /// User the message belongs to
    #[arg(long)]
    pub user_id: Option<i64>,

    /// Agent persona answering
    #[arg(long)]
    pub agent_id: Option<i64>,

    /// Continue an existing conversation
    #[arg(long)]
    pub conversation_id: Option<String>,

    /// Replace the built-in system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,
}

impl TurnArgs {
    pub fn into_request(self, message: String) -> TurnRequest {
        TurnRequest {
            user_message: message,
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            agent_id: self.agent_id,
            system_prompt: self.system_prompt,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message and print the answer
    Chat {
        /// The message to send
        message: String,

        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Send one message and print the answer as Server-Sent Events
    Stream {
        /// The message to send
        message: String,

        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Show health of memory, search and generation
    Health,

    /// Show engine statistics
    Stats,

    /// Delete stored conversations and facts
    ClearMemory {
        /// Only clear this user's memory
        #[arg(long)]
        user_id: Option<i64>,
    },

    /// Store a fact about a user
    Remember {
        /// Fact name
        #[arg(long)]
        key: String,

        /// Fact value
        #[arg(long)]
        value: String,

        /// User the fact belongs to
        #[arg(long)]
        user_id: Option<i64>,
    },

    /// Manage provider API keys in the OS keychain
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Keychain actions
#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a secret (e.g. openai_api_key)
    Set {
        /// Secret name
        key: String,
        /// Secret value
        value: String,
    },

    /// Remove a stored secret
    Delete {
        /// Secret name
        key: String,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
}
