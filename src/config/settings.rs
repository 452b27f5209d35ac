//! # Configuration Settings
//!
//! Defines the configuration handed to the secret engine. Nothing in the
//! engine reads global state; every operation receives an [`EngineConfig`].

use crate::errors::{Error, Result};
use crate::secrets::{SecretBackendType, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use validator::Validate;

/// Default KV v2 mount.
pub const DEFAULT_MOUNT_PATH: &str = "secret";

/// Default prefix of the mirror tree.
pub const DEFAULT_MIRROR_PREFIX: &str = "ci";

/// Days between a destroy request and eligibility for permanent removal.
pub const DEFAULT_DESTROY_GRACE_DAYS: u32 = 8;

/// Custom-metadata key carrying the destroy-not-before date.
pub const DEFAULT_DESTROY_AFTER_KEY: &str = "destroy_after";

/// Custom-metadata keys every created secret must carry.
pub const DEFAULT_REQUIRED_METADATA: [&str; 3] = ["owner", "source", "usage"];

/// Secret engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// KV v2 mount path
    #[validate(length(min = 1, message = "Mount path cannot be empty"))]
    pub mount_path: String,

    /// Platform scope prefixed to secret paths (empty = whole mount)
    pub platform: String,

    /// Prefix of the mirror tree
    #[validate(length(min = 1, message = "Mirror prefix cannot be empty"))]
    pub mirror_prefix: String,

    /// Grace period between destroy and permanent removal
    #[validate(range(min = 1, max = 365, message = "Destroy grace period must be between 1 and 365 days"))]
    pub destroy_grace_days: u32,

    /// Custom-metadata key holding the destroy date
    #[validate(length(min = 1, message = "Destroy metadata key cannot be empty"))]
    pub destroy_after_key: String,

    /// Custom-metadata keys required on create
    pub required_metadata: Vec<String>,

    /// Backend kind
    pub backend: SecretBackendType,

    /// Equivalent replica endpoints; every write goes to all of them
    #[validate(nested)]
    pub replicas: Vec<ReplicaConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            platform: String::new(),
            mirror_prefix: DEFAULT_MIRROR_PREFIX.to_string(),
            destroy_grace_days: DEFAULT_DESTROY_GRACE_DAYS,
            destroy_after_key: DEFAULT_DESTROY_AFTER_KEY.to_string(),
            required_metadata: DEFAULT_REQUIRED_METADATA.iter().map(|k| k.to_string()).collect(),
            backend: SecretBackendType::default(),
            replicas: Vec::new(),
        }
    }
}

/// One backend replica endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReplicaConfig {
    /// Human-readable replica name
    #[validate(length(min = 1, max = 64, message = "Replica name must be 1-64 characters"))]
    pub name: String,

    /// Server address (e.g. "https://vault-a.example.com:8200")
    #[validate(length(min = 1, message = "Replica address cannot be empty"))]
    pub address: String,

    /// Authentication token (redacted in logs and serialization)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretString>,

    /// Vault namespace (Enterprise multi-tenancy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply `KVMIRROR_*` and `VAULT_*` environment overrides.
    ///
    /// `VAULT_ADDR` only adds a replica when the configuration lists none.
    pub fn apply_env(&mut self) {
        if let Ok(platform) = std::env::var("KVMIRROR_PLATFORM") {
            self.platform = platform;
        }
        if let Ok(mount) = std::env::var("KVMIRROR_MOUNT_PATH") {
            self.mount_path = mount;
        }
        if let Ok(prefix) = std::env::var("KVMIRROR_MIRROR_PREFIX") {
            self.mirror_prefix = prefix;
        }
        if let Ok(backend) = std::env::var("KVMIRROR_BACKEND") {
            match backend.parse() {
                Ok(kind) => self.backend = kind,
                Err(e) => tracing::warn!(error = %e, "Ignoring KVMIRROR_BACKEND"),
            }
        }
        if let Some(days) = std::env::var("KVMIRROR_DESTROY_GRACE_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.destroy_grace_days = days;
        }

        if self.replicas.is_empty() {
            if let Ok(address) = std::env::var("VAULT_ADDR") {
                self.replicas.push(ReplicaConfig {
                    name: "default".to_string(),
                    address,
                    token: crate::secrets::vault::token_from_env(),
                    namespace: std::env::var("VAULT_NAMESPACE").ok(),
                });
            }
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        let prefix = self.mirror_prefix.trim_matches('/');
        let platform = self.platform.trim_matches('/');
        if prefix.is_empty() {
            return Err(Error::validation("Mirror prefix cannot be only slashes"));
        }
        if platform == prefix || platform.starts_with(&format!("{}/", prefix)) {
            return Err(Error::validation(format!(
                "Platform '{}' cannot live inside the mirror tree '{}'",
                platform, prefix
            )));
        }

        if self.backend == SecretBackendType::Vault && self.replicas.is_empty() {
            return Err(Error::validation(
                "At least one replica is required for the vault backend (set VAULT_ADDR or [[replicas]])",
            ));
        }

        let mut seen = HashSet::new();
        for replica in &self.replicas {
            if !seen.insert(replica.name.as_str()) {
                return Err(Error::validation(format!("Duplicate replica name '{}'", replica.name)));
            }
        }

        if self.required_metadata.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::validation("Required metadata keys cannot be empty"));
        }

        Ok(())
    }

    /// Scope used when the caller gives none.
    pub fn platform_scope(&self) -> &str {
        self.platform.trim_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> EngineConfig {
        EngineConfig { backend: SecretBackendType::Memory, ..Default::default() }
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.mount_path, "secret");
        assert_eq!(config.mirror_prefix, "ci");
        assert_eq!(config.destroy_grace_days, 8);
        assert_eq!(config.destroy_after_key, "destroy_after");
        assert_eq!(config.required_metadata, vec!["owner", "source", "usage"]);
    }

    #[test]
    fn test_memory_backend_needs_no_replicas() {
        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn test_vault_backend_requires_replica() {
        let config = EngineConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("At least one replica"));
    }

    #[test]
    fn test_platform_inside_mirror_rejected() {
        let config = EngineConfig { platform: "ci/platform-a".to_string(), ..memory_config() };
        assert!(config.validate().is_err());

        let config = EngineConfig { platform: "circle".to_string(), ..memory_config() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grace_period_range() {
        let config = EngineConfig { destroy_grace_days: 0, ..memory_config() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("destroy_grace_days"));
    }

    #[test]
    fn test_duplicate_replica_names_rejected() {
        let replica = ReplicaConfig {
            name: "a".to_string(),
            address: "http://127.0.0.1:8200".to_string(),
            token: None,
            namespace: None,
        };
        let config = EngineConfig { replicas: vec![replica.clone(), replica], ..Default::default() };
        assert!(config.validate().unwrap_err().to_string().contains("Duplicate replica"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            mount_path = "kv"
            platform = "platform-a"
            backend = "vault"

            [[replicas]]
            name = "eu"
            address = "https://vault-eu.example.com:8200"
            token = "hvs.eu"

            [[replicas]]
            name = "us"
            address = "https://vault-us.example.com:8200"
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mount_path, "kv");
        assert_eq!(config.mirror_prefix, "ci");
        assert_eq!(config.replicas.len(), 2);
        assert_eq!(config.replicas[0].token.as_ref().unwrap().expose_secret(), "hvs.eu");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replica_token_redacted_in_debug() {
        let replica = ReplicaConfig {
            name: "eu".to_string(),
            address: "https://vault".to_string(),
            token: Some(SecretString::new("hvs.top-secret")),
            namespace: None,
        };
        assert!(!format!("{:?}", replica).contains("hvs.top-secret"));
    }
}
