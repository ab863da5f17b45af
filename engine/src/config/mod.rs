//! Configuration management
//!
//! This module handles loading, validation, and management of the Parley configuration.
//! Configuration is stored in TOML format at ~/.parley/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Generation provider settings and preferences
//! - **memory**: Conversation memory database
//! - **search**: Web search provider
//! - **server**: HTTP bind address
//!
//! # Path Expansion
//!
//! The data directory supports `~` expansion and is created on load if it
//! doesn't exist.
//!
//! # Examples
//!
//! ```no_run
//! use parley_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from default location
//! let config = Config::load_or_create()?;
//!
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// LLM provider configuration
    pub llm: LLMConfig,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Web search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (openai, ollama, anthropic)
    pub default_provider: String,

    /// Per-provider request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Anthropic provider settings
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,
    // Note: API key comes from OPENAI_API_KEY or the OS keychain, not from config
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Register Ollama as a fallback even when it isn't the default
    #[serde(default)]
    pub enabled: bool,
}

/// Anthropic provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Base URL for Anthropic API
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Register Anthropic as a fallback even when it isn't the default
    #[serde(default)]
    pub enabled: bool,
}

/// Memory system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// SQLite file name, relative to the data directory
    #[serde(default = "default_memory_database")]
    pub database: String,
}

/// Web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Enable web search during retrieval
    #[serde(default)]
    pub enabled: bool,

    /// Search provider (searxng)
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// Base URL of the search instance
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Upper bound on results requested from the provider
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the API server binds to
    #[serde(default = "default_bind")]
    pub bind: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.parley")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_memory_database() -> String {
    "memory.db".to_string()
}

fn default_search_provider() -> String {
    "searxng".to_string()
}

fn default_search_base_url() -> String {
    "http://localhost:8888".to_string()
}

fn default_search_max_results() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    10
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            enabled: false,
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
            enabled: false,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            database: default_memory_database(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_search_provider(),
            base_url: default_search_base_url(),
            max_results: default_search_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            request_timeout_secs: default_request_timeout(),
            openai: OpenAIConfig::default(),
            ollama: OllamaConfig::default(),
            anthropic: AnthropicConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.parley/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.parley/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".parley").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            llm: LLMConfig::default(),
            memory: MemoryConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Full path of the memory database
    pub fn memory_db_path(&self) -> PathBuf {
        self.core.data_dir.join(&self.memory.database)
    }

    /// Validate and process configuration
    ///
    /// Validates enumerated fields and ranges, expands `~` in the data
    /// directory, and creates it if missing.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["openai", "ollama", "anthropic"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.llm.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.search.provider != "searxng" {
            return Err(EngineError::Config(format!(
                "Invalid search provider '{}'. Must be: searxng",
                self.search.provider
            )));
        }

        if self.search.max_results == 0 {
            return Err(EngineError::Config(
                "search.max_results must be greater than 0".to_string(),
            ));
        }

        if self.memory.database.trim().is_empty() {
            return Err(EngineError::Config(
                "memory.database must not be empty".to_string(),
            ));
        }

        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                EngineError::Config(format!("Invalid server bind '{}': {}", self.server.bind, e))
            })?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
///
/// # Examples
///
/// ```ignore
/// let path = PathBuf::from("~/.parley");
/// let expanded = expand_path(&path)?;
/// // expanded is now /home/user/.parley (on Unix)
/// ```
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
