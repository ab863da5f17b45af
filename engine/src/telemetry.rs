//! Telemetry and Observability
//!
//! Handles setting up `tracing-subscriber` for structured logging.
//! Supports config-driven log levels, environment variable overrides,
//! and format switching between pretty and JSON output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// One JSON object per line, with the current span attached
    Json,
}

impl LogFormat {
    /// Pretty in debug builds, JSON in release builds.
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

/// Build the filter directive for a configured level.
///
/// The crate's own target is pinned to the same level so that a noisy
/// dependency can be silenced via `RUST_LOG` without hiding turn logs.
pub fn filter_directive(log_level: &str) -> String {
    format!("{},parley_engine={},api_server={}", log_level, log_level, log_level)
}

/// Initialize the tracing subscriber with the given log level from config.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter > default "info"
///
/// Logs are written to stderr so that `--json` command output on stdout
/// stays machine-readable.
pub fn init_telemetry_with_level(log_level: &str, format: LogFormat) {
    let default_filter = filter_directive(log_level);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .ok();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .ok();
        }
    }
}

/// Initialize the tracing subscriber with default settings.
///
/// Falls back to "info" level if no `RUST_LOG` env var is set.
/// Use `init_telemetry_with_level` when config is available.
pub fn init_telemetry() {
    init_telemetry_with_level("info", LogFormat::for_build());
}
