//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: Answer one message through the blocking entry point
//! - stream: Answer one message as a paced event stream
//! - health / stats: Report on the engine's dependencies
//! - clear-memory / remember: Maintain the memory store
//! - secret / config: Manage credentials and configuration

use anyhow::{Context, Result};
use futures::StreamExt;
use sdk::types::{TurnRequest, WireEvent};
use std::io::Write;

use crate::config::Config;
use crate::rag::ConversationService;
use crate::secrets::{SecretManager, SERVICE_NAME};
use crate::services::Services;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to encode output")?
    );
    Ok(())
}

/// Answer one message
///
/// Runs the turn through the blocking bridge on a blocking-pool thread, the
/// way a synchronous caller embedded in this process would.
pub async fn handle_chat(
    services: &Services,
    request: TurnRequest,
    format: OutputFormat,
) -> Result<()> {
    let conversation: ConversationService = services.conversation.clone();
    let envelope = tokio::task::spawn_blocking(move || conversation.process_message_blocking(request))
        .await
        .context("Chat worker failed")?;

    match format {
        OutputFormat::Json => print_json(&envelope)?,
        OutputFormat::Text => {
            println!("{}", envelope.data.message);
            if let Some(error) = &envelope.error {
                eprintln!("error: {}", error);
            }
            eprintln!(
                "[conversation {} | memories {} | web {} | {:.2}s]",
                envelope.data.conversation_id,
                envelope.data.metadata.memory_used,
                envelope.data.metadata.web_results,
                envelope.data.metadata.processing_time
            );
        }
    }

    Ok(())
}

/// Answer one message as a stream
///
/// JSON output prints raw SSE frames; text output prints the chunks as
/// they arrive.
pub async fn handle_stream(
    services: &Services,
    request: TurnRequest,
    format: OutputFormat,
) -> Result<()> {
    let mut events = services.conversation.stream_events(request);
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        match format {
            OutputFormat::Json => {
                write!(stdout, "{}", event.to_sse_frame())?;
            }
            OutputFormat::Text => match &event {
                WireEvent::Chunk { content, .. } => write!(stdout, "{}", content)?,
                WireEvent::Complete { .. } => writeln!(stdout)?,
                WireEvent::Error { error, .. } => eprintln!("error: {}", error),
                WireEvent::Metadata { .. } => {}
            },
        }
        stdout.flush()?;
    }

    Ok(())
}

pub async fn handle_health(services: &Services, format: OutputFormat) -> Result<()> {
    let health = services.conversation.health_check().await;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Text => {
            println!("Status: {}", health.status);
            println!("Model:  {}", health.rag_service.model);
            let components = &health.rag_service.components;
            for component in [
                &components.memory,
                &components.search,
                &components.generation,
            ] {
                match &component.detail {
                    Some(detail) => {
                        println!("  {:<11} {} ({})", component.name, component.status, detail)
                    }
                    None => println!("  {:<11} {}", component.name, component.status),
                }
            }
        }
    }

    Ok(())
}

pub async fn handle_stats(services: &Services, format: OutputFormat) -> Result<()> {
    let stats = services.conversation.stats().await;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Text => {
            let memory = services.memory.stats().await?;
            println!("Parley v{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_COMMIT_HASH"));
            println!("Model:          {}", stats["rag_service"]["model"].as_str().unwrap_or("-"));
            println!("Conversations:  {}", memory.conversations);
            println!("Facts:          {}", memory.facts);
            println!("Users:          {}", memory.users);
        }
    }

    Ok(())
}

pub async fn handle_clear_memory(
    services: &Services,
    user_id: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    let result = services.conversation.clear_memory(user_id).await;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => println!("{}", result.message),
    }

    if result.success {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Memory was not cleared"))
    }
}

pub async fn handle_remember(
    services: &Services,
    user_id: Option<i64>,
    key: &str,
    value: &str,
    format: OutputFormat,
) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow::anyhow!("Fact key cannot be empty"));
    }

    services
        .memory
        .set_fact(user_id, key, value)
        .await
        .context("Failed to store fact")?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "user_id": user_id,
        }))?,
        OutputFormat::Text => println!("Remembered '{}'", key),
    }

    Ok(())
}

pub fn handle_secret_set(key: &str, value: &str) -> Result<()> {
    SecretManager::new(SERVICE_NAME).set_secret(key, value)?;
    println!("Stored '{}' in the system keychain", key);
    Ok(())
}

pub fn handle_secret_delete(key: &str) -> Result<()> {
    SecretManager::new(SERVICE_NAME).delete_secret(key)?;
    println!("Deleted '{}' from the system keychain", key);
    Ok(())
}

pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(config)?,
        OutputFormat::Text => {
            let text = toml::to_string_pretty(config).context("Failed to encode config")?;
            print!("{}", text);
        }
    }
    Ok(())
}
