//! Integration tests for configuration loading
//!
//! These tests validate that the engine configuration is read from TOML files
//! and that environment variables override it.

use kvmirror::config::EngineConfig;
use kvmirror::observability::log_config_info;
use kvmirror::secrets::SecretBackendType;
use kvmirror::Result;
use std::env;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing_test::traced_test;

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ENV_KEYS: [&str; 7] = [
    "KVMIRROR_PLATFORM",
    "KVMIRROR_MOUNT_PATH",
    "KVMIRROR_MIRROR_PREFIX",
    "KVMIRROR_BACKEND",
    "KVMIRROR_DESTROY_GRACE_DAYS",
    "VAULT_ADDR",
    "VAULT_NAMESPACE",
];

/// Clears the variables under test and restores them on drop.
struct EnvSnapshot(Vec<(&'static str, Option<String>)>);

impl EnvSnapshot {
    fn take() -> Self {
        let saved = ENV_KEYS.iter().map(|k| (*k, env::var(k).ok())).collect();
        for key in ENV_KEYS {
            env::remove_var(key);
        }
        Self(saved)
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (key, value) in &self.0 {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _env = EnvSnapshot::take();

    let file = config_file(
        r#"
        platform = "platform-a"
        mount_path = "kv"
        destroy_grace_days = 14
        backend = "vault"

        [[replicas]]
        name = "eu"
        address = "https://vault-eu.example.com:8200"
        "#,
    );

    let config = EngineConfig::load(Some(file.path()))?;
    assert_eq!(config.platform, "platform-a");
    assert_eq!(config.mount_path, "kv");
    assert_eq!(config.destroy_grace_days, 14);
    assert_eq!(config.replicas.len(), 1);
    assert_eq!(config.replicas[0].name, "eu");
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _env = EnvSnapshot::take();

    let file = config_file("platform = \"platform-a\"\nbackend = \"vault\"\n");
    env::set_var("KVMIRROR_PLATFORM", "platform-b");
    env::set_var("KVMIRROR_DESTROY_GRACE_DAYS", "3");
    env::set_var("VAULT_ADDR", "http://127.0.0.1:8200");
    env::set_var("VAULT_NAMESPACE", "team-a");

    let config = EngineConfig::load(Some(file.path()))?;
    assert_eq!(config.platform, "platform-b");
    assert_eq!(config.destroy_grace_days, 3);
    assert_eq!(config.replicas.len(), 1);
    assert_eq!(config.replicas[0].address, "http://127.0.0.1:8200");
    assert_eq!(config.replicas[0].namespace.as_deref(), Some("team-a"));
    Ok(())
}

#[test]
fn test_vault_addr_does_not_replace_configured_replicas() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _env = EnvSnapshot::take();

    let file = config_file(
        r#"
        [[replicas]]
        name = "eu"
        address = "https://vault-eu.example.com:8200"
        "#,
    );
    env::set_var("VAULT_ADDR", "http://127.0.0.1:8200");

    let config = EngineConfig::load(Some(file.path()))?;
    assert_eq!(config.replicas.len(), 1);
    assert_eq!(config.replicas[0].address, "https://vault-eu.example.com:8200");
    Ok(())
}

#[test]
fn test_backend_from_environment() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _env = EnvSnapshot::take();

    env::set_var("KVMIRROR_BACKEND", "memory");
    let config = EngineConfig::load(None)?;
    assert_eq!(config.backend, SecretBackendType::Memory);
    Ok(())
}

#[test]
fn test_invalid_files_are_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _env = EnvSnapshot::take();

    let malformed = config_file("platform = [");
    assert!(EngineConfig::load(Some(malformed.path())).is_err());

    let inside_mirror = config_file("backend = \"memory\"\nplatform = \"ci/platform-a\"\n");
    assert!(EngineConfig::load(Some(inside_mirror.path())).is_err());

    let missing = std::path::Path::new("/nonexistent/kvmirror.toml");
    assert!(EngineConfig::load(Some(missing)).is_err());

    // No replicas and no VAULT_ADDR for the default vault backend
    assert!(EngineConfig::load(None).is_err());
}

#[traced_test]
#[test]
fn test_config_logging_omits_tokens() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _env = EnvSnapshot::take();

    let file = config_file(
        r#"
        platform = "platform-a"

        [[replicas]]
        name = "eu"
        address = "https://vault-eu.example.com:8200"
        token = "hvs.do-not-log"
        "#,
    );
    let config = EngineConfig::load(Some(file.path())).unwrap();
    log_config_info(&config);

    assert!(logs_contain("kvmirror engine configuration"));
    assert!(logs_contain("vault-eu.example.com"));
    assert!(!logs_contain("hvs.do-not-log"));
}
