// Parley HTTP server
// Serves the conversation engine over the /api routes

use anyhow::Context;
use clap::Parser;
use parley_engine::config::Config;
use parley_engine::services::Services;
use parley_engine::telemetry::{init_telemetry_with_level, LogFormat};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Parley HTTP server
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Specify alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides [server].bind
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_or_create()?,
    };

    let log_level = args.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level, LogFormat::for_build());

    let addr = match args.bind {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", config.server.bind))?,
    };

    let services = Services::build(&config).await?;

    let served = api_server::serve(addr, services.conversation.clone(), async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await;

    services.shutdown().await?;
    served?;
    Ok(())
}
