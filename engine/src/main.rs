// Parley conversation engine
// Main entry point for the parley binary

use clap::Parser;
use parley_engine::cli::{Cli, Command, ConfigAction, SecretAction};
use parley_engine::config::Config;
use parley_engine::handlers::{
    handle_chat, handle_clear_memory, handle_config_show, handle_health, handle_remember,
    handle_secret_delete, handle_secret_set, handle_stats, handle_stream, OutputFormat,
};
use parley_engine::services::Services;
use parley_engine::telemetry::{init_telemetry_with_level, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_or_create()?,
    };

    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    let log_format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::for_build()
    };
    // A subscriber can be installed once; RUST_LOG still wins over the level
    init_telemetry_with_level(log_level, log_format);

    tracing::info!(
        "Parley v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Commands that never touch the database
    match &cli.command {
        Command::Secret { action } => {
            return match action {
                SecretAction::Set { key, value } => handle_secret_set(key, value),
                SecretAction::Delete { key } => handle_secret_delete(key),
            };
        }
        Command::Config {
            action: ConfigAction::Show,
        } => return handle_config_show(&config, format),
        _ => {}
    }

    let services = Services::build(&config).await?;

    let result = match cli.command {
        Command::Chat { message, turn } => {
            handle_chat(&services, turn.into_request(message), format).await
        }
        Command::Stream { message, turn } => {
            handle_stream(&services, turn.into_request(message), format).await
        }
        Command::Health => handle_health(&services, format).await,
        Command::Stats => handle_stats(&services, format).await,
        Command::ClearMemory { user_id } => handle_clear_memory(&services, user_id, format).await,
        Command::Remember {
            key,
            value,
            user_id,
        } => handle_remember(&services, user_id, &key, &value, format).await,
        Command::Secret { .. } | Command::Config { .. } => Ok(()),
    };

    if let Err(e) = services.shutdown().await {
        tracing::warn!("Database shutdown failed: {:#}", e);
    }

    result
}
