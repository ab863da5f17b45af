pub mod cache;
pub mod string;

pub use cache::SecretCache;
pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::EngineError;
use std::sync::OnceLock;

/// Keychain service name under which Parley stores its secrets.
pub const SERVICE_NAME: &str = "parley";

/// SecretManager resolves provider credentials.
///
/// Lookup order for a key such as `openai_api_key`:
/// 1. The environment variable `OPENAI_API_KEY`
/// 2. The OS keychain entry `parley/openai_api_key`
///
/// Secrets are stored in:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// The engine runs unattended behind an HTTP server, so a missing secret is
/// reported as `None` instead of prompting. Use `parley secret set` to store one.
///
/// The SecretManager also provides secret scrubbing for log output and
/// error messages that might echo a credential back.
pub struct SecretManager {
    service_name: String,
    use_keychain: bool,
}

/// Regex patterns for detecting common secret formats.
/// These are compiled once and reused for performance.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Initializes and returns the secret detection patterns.
///
/// Patterns match:
/// - OpenAI API keys: sk-[a-zA-Z0-9]{20,}
/// - Anthropic API keys: sk-ant-... (covered by the OpenAI pattern)
/// - Google API keys: AIza[0-9A-Za-z-_]{35}
/// - GitHub tokens: ghp_[a-zA-Z0-9]{36}
/// - Bearer tokens: Bearer\s+[^\s]{20,}
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            r"sk-[a-zA-Z0-9\-_]{20,}",
            r"AIza[0-9A-Za-z\-_]{35}",
            r"ghp_[a-zA-Z0-9]{36}",
            r"Bearer\s+[^\s]{20,}",
            r"(?i)(api[_-]?key|x-api-key)[=:]\s*[^\s&]{8,}",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Replace every detected secret in `text` with `[REDACTED]`.
pub fn scrub(text: &str) -> String {
    let mut result = text.to_string();

    for pattern in get_secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }

    result
}

impl SecretManager {
    /// Creates a new SecretManager with the given service name.
    ///
    /// The service name is used to namespace secrets in the OS keychain.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            use_keychain: true,
        }
    }

    /// A manager that only reads environment variables.
    pub fn offline() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            use_keychain: false,
        }
    }

    /// Environment variable consulted for `key`: the key upper-cased.
    pub fn env_var_name(key: &str) -> String {
        key.to_ascii_uppercase()
    }

    /// Retrieves a secret from the environment or the OS keychain.
    ///
    /// # Arguments
    /// * `key` - The key identifying the secret (e.g., "openai_api_key")
    ///
    /// # Returns
    /// `Some(value)` when found, `None` when neither source has it.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if the keyring entry cannot be built.
    pub fn get_secret(&self, key: &str) -> Result<Option<String>, EngineError> {
        if let Ok(value) = std::env::var(Self::env_var_name(key)) {
            if !value.trim().is_empty() {
                tracing::debug!("Using secret '{}' from environment", key);
                return Ok(Some(value));
            }
        }

        if !self.use_keychain {
            return Ok(None);
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                // Headless hosts often have no secret service running.
                tracing::warn!("Keychain unavailable while reading '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    /// Stores a secret in the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if the value is empty or keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), EngineError> {
        if value.trim().is_empty() {
            return Err(EngineError::KeyringError(
                "Secret cannot be empty".to_string(),
            ));
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.set_password(value).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Deletes a secret from the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if keychain access fails
    pub fn delete_secret(&self, key: &str) -> Result<(), EngineError> {
        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.delete_password().map_err(|e| {
            EngineError::KeyringError(format!("Failed to delete secret '{}': {}", key, e))
        })?;

        tracing::info!("Deleted secret '{}' from keychain", key);
        Ok(())
    }

    /// Whether `key` resolves to a value from either source.
    pub fn has_secret(&self, key: &str) -> bool {
        matches!(self.get_secret(key), Ok(Some(_)))
    }

    /// Scrubs secrets from text by replacing them with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use parley_engine::secrets::SecretManager;
    ///
    /// let manager = SecretManager::new("test");
    /// let scrubbed = manager.scrub("My API key is sk-1234567890abcdefghij");
    /// assert_eq!(scrubbed, "My API key is [REDACTED]");
    /// ```
    pub fn scrub(&self, text: &str) -> String {
        scrub(text)
    }
}
