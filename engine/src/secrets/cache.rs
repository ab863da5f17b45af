use crate::secrets::string::SecretString;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An in-memory cache in front of `SecretManager`.
///
/// Provider clients look their key up on every request; the cache keeps
/// that from reaching the OS keychain each time. Misses are cached too, so
/// a provider without a key fails fast.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, Option<SecretString>>>>,
}

impl SecretCache {
    /// Creates a new SecretCache wrapping the provided SecretManager
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A cache pre-filled with fixed values that never consults the keychain.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let cache = values
            .into_iter()
            .map(|(k, v)| (k.into(), Some(SecretString::new(v))))
            .collect();
        Self {
            manager: Arc::new(SecretManager::offline()),
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Retrieves a secret, checking the memory cache first.
    ///
    /// Returns `Ok(None)` when neither the environment nor the keychain
    /// holds a value for `key`.
    pub fn get_secret(&self, key: &str) -> Result<Option<SecretString>, EngineError> {
        {
            let cache = self.cache.read().unwrap_or_else(|p| p.into_inner());
            if let Some(secret) = cache.get(key) {
                return Ok(secret.clone());
            }
        }

        let secret = self.manager.get_secret(key)?.map(SecretString::new);

        {
            let mut cache = self.cache.write().unwrap_or_else(|p| p.into_inner());
            cache.insert(key.to_string(), secret.clone());
        }

        Ok(secret)
    }

    /// Like `get_secret`, but a missing value is an error.
    pub fn require_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        self.get_secret(key)?.ok_or_else(|| {
            EngineError::KeyringError(format!(
                "Secret '{}' not set. Export {} or run `parley secret set {}`",
                key,
                SecretManager::env_var_name(key),
                key
            ))
        })
    }

    /// Forget a cached value so the next lookup reaches the manager again.
    pub fn invalidate(&self, key: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|p| p.into_inner());
        cache.remove(key);
    }
}
