use parley_engine::secrets::{scrub, SecretCache, SecretManager};
use std::sync::Arc;

#[test]
fn test_environment_secret_resolves_offline() {
    std::env::set_var("PARLEY_IT_ENV_KEY", "sk-from-environment");
    let manager = SecretManager::offline();

    assert_eq!(
        manager.get_secret("parley_it_env_key").unwrap().as_deref(),
        Some("sk-from-environment")
    );
    assert!(manager.has_secret("parley_it_env_key"));
    assert!(!manager.has_secret("parley_it_absent_key"));

    std::env::remove_var("PARLEY_IT_ENV_KEY");
}

#[test]
fn test_blank_environment_value_is_ignored() {
    std::env::set_var("PARLEY_IT_BLANK_KEY", "   ");
    let manager = SecretManager::offline();

    assert_eq!(manager.get_secret("parley_it_blank_key").unwrap(), None);

    std::env::remove_var("PARLEY_IT_BLANK_KEY");
}

#[test]
fn test_cache_remembers_misses() {
    let cache = SecretCache::new(Arc::new(SecretManager::offline()));

    assert!(cache.get_secret("parley_it_cached_key").unwrap().is_none());

    // A value appearing later is not seen until the entry is invalidated
    std::env::set_var("PARLEY_IT_CACHED_KEY", "sk-late-arrival");
    assert!(cache.get_secret("parley_it_cached_key").unwrap().is_none());

    cache.invalidate("parley_it_cached_key");
    let secret = cache.get_secret("parley_it_cached_key").unwrap().unwrap();
    assert_eq!(secret.unsecure(), "sk-late-arrival");

    std::env::remove_var("PARLEY_IT_CACHED_KEY");
}

#[test]
fn test_keychain_round_trip() {
    if std::env::var("CI").is_ok() {
        return; // Skip: no keyring in CI
    }
    let manager = SecretManager::new("parley-integration-test");
    let key = "parley_it_keychain_key";

    // Hosts without a secret service cannot store anything
    if manager.set_secret(key, "sk-keychain-value").is_err() {
        return;
    }

    assert_eq!(
        manager.get_secret(key).unwrap().as_deref(),
        Some("sk-keychain-value")
    );
    manager.delete_secret(key).unwrap();
}

#[test]
fn test_provider_errors_are_scrubbed() {
    let message = "401 from provider: invalid key sk-abcdefghijklmnopqrstuvwx (Bearer abcdefghijklmnopqrstuvwxyz)";
    let scrubbed = scrub(message);

    assert!(!scrubbed.contains("sk-abcdefghijklmnopqrstuvwx"));
    assert!(!scrubbed.contains("abcdefghijklmnopqrstuvwxyz"));
    assert!(scrubbed.starts_with("401 from provider: invalid key [REDACTED]"));
}
