//! HashiCorp Vault KV v2 replica.
//!
//! Implements [`SecretBackend`] on top of Vault's KV v2 secrets engine using
//! `vaultrs`. One [`VaultReplica`] talks to one Vault address; several of
//! them form a [`ReplicaSet`](super::ReplicaSet).
//!
//! # Security
//!
//! - Tokens are held in [`SecretString`] and never logged
//! - Secret values are never logged, only key counts
//! - Check-and-set is used for every version write

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use vaultrs::api::kv2::requests::{SetSecretMetadataRequestBuilder, SetSecretRequestOptions};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use super::backend::{SecretBackend, SecretBackendType};
use super::error::{Result, SecretsError};
use super::types::{CustomMetadata, SecretData, SecretMetadata, SecretString, VersionState};
use crate::config::ReplicaConfig;

/// One Vault endpoint serving a KV v2 mount.
pub struct VaultReplica {
    client: VaultClient,
    address: String,
    mount_path: String,
}

impl std::fmt::Debug for VaultReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultReplica")
            .field("address", &self.address)
            .field("mount_path", &self.mount_path)
            .finish()
    }
}

impl VaultReplica {
    /// Creates a replica handle and checks that Vault answers its health endpoint.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::ConfigError`] if the configuration is invalid
    /// - [`SecretsError::BackendError`] if Vault is unreachable
    pub async fn connect(config: &ReplicaConfig, mount_path: &str) -> Result<Self> {
        if config.address.is_empty() {
            return Err(SecretsError::config_error("Vault address cannot be empty"));
        }

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&config.address);

        if let Some(token) = config.token.as_ref().filter(|t| !t.is_empty()) {
            settings_builder.token(token.expose_secret());
        }

        if let Some(namespace) = config.namespace.clone() {
            settings_builder.namespace(Some(namespace));
        }

        let settings = settings_builder.build().map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault configuration: {}", e))
        })?;

        let client = VaultClient::new(settings).map_err(|e| {
            SecretsError::backend_error(format!(
                "Failed to create Vault client for {}: {}",
                config.address, e
            ))
        })?;

        match vaultrs::sys::health(&client).await {
            Ok(_) => {
                tracing::info!(
                    replica = %config.name,
                    address = %config.address,
                    mount_path = %mount_path,
                    "Connected to Vault replica"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, address = %config.address, "Vault health check failed");
                return Err(SecretsError::backend_error(format!(
                    "Vault health check failed for {}: {}",
                    config.address, e
                )));
            }
        }

        Ok(Self { client, address: config.address.clone(), mount_path: mount_path.to_string() })
    }

    /// Translate a `vaultrs` error, keeping 404s distinguishable.
    fn map_error(&self, err: ClientError, key: &str, action: &str) -> SecretsError {
        match err {
            ClientError::APIError { code: 404, .. } => SecretsError::not_found(key),
            ClientError::APIError { code: 400, errors } if is_cas_rejection(&errors) => {
                SecretsError::conflict(key, errors.join("; "))
            }
            other => SecretsError::backend_error(format!(
                "Vault {} failed for '{}' at {}: {}",
                action, key, self.address, other
            )),
        }
    }

    fn cas_token(&self, path: &str, cas: u64) -> Result<u32> {
        u32::try_from(cas).map_err(|_| {
            SecretsError::conflict(path, format!("check-and-set version {} out of range", cas))
        })
    }
}

fn is_cas_rejection(errors: &[String]) -> bool {
    errors.iter().any(|e| e.contains("check-and-set"))
}

/// Vault reports timestamps as RFC 3339 strings and "no deletion" as `""`.
pub(crate) fn parse_vault_time(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl SecretBackend for VaultReplica {
    fn address(&self) -> &str {
        &self.address
    }

    async fn read_metadata(&self, path: &str) -> Result<SecretMetadata> {
        let response = kv2::read_metadata(&self.client, &self.mount_path, path)
            .await
            .map_err(|e| self.map_error(e, path, "metadata read"))?;

        let mut versions = BTreeMap::new();
        for (raw_version, meta) in &response.versions {
            match raw_version.parse::<u64>() {
                Ok(version) => {
                    let state = VersionState {
                        created_time: parse_vault_time(&meta.created_time),
                        deletion_time: parse_vault_time(&meta.deletion_time),
                        destroyed: meta.destroyed,
                    };
                    versions.insert(version, state);
                }
                Err(_) => {
                    tracing::warn!(path = %path, version = %raw_version, "Ignoring non-numeric version key");
                }
            }
        }

        Ok(SecretMetadata {
            current_version: response.current_version,
            oldest_version: response.oldest_version,
            versions,
            custom_metadata: response
                .custom_metadata
                .map(|m| m.into_iter().collect())
                .unwrap_or_default(),
        })
    }

    async fn read_data(&self, path: &str, version: u64) -> Result<SecretData> {
        let data: HashMap<String, String> =
            kv2::read_version(&self.client, &self.mount_path, path, version)
                .await
                .map_err(|e| self.map_error(e, &format!("{}@{}", path, version), "read"))?;
        Ok(data.into_iter().collect())
    }

    async fn write_version(&self, path: &str, data: &SecretData, cas: Option<u64>) -> Result<u64> {
        let payload: HashMap<&str, &str> =
            data.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let written = match cas {
            Some(cas) => {
                let options = SetSecretRequestOptions { cas: self.cas_token(path, cas)? };
                kv2::set_with_options(&self.client, &self.mount_path, path, &payload, options).await
            }
            None => kv2::set(&self.client, &self.mount_path, path, &payload).await,
        }
        .map_err(|e| self.map_error(e, path, "write"))?;

        tracing::debug!(
            path = %path,
            version = written.version,
            keys = data.len(),
            address = %self.address,
            "Wrote secret version to Vault"
        );
        Ok(written.version)
    }

    async fn soft_delete(&self, path: &str, versions: &[u64]) -> Result<()> {
        kv2::delete_versions(&self.client, &self.mount_path, path, versions.to_vec())
            .await
            .map_err(|e| self.map_error(e, path, "soft delete"))
    }

    async fn undelete(&self, path: &str, versions: &[u64]) -> Result<()> {
        kv2::undelete_versions(&self.client, &self.mount_path, path, versions.to_vec())
            .await
            .map_err(|e| self.map_error(e, path, "undelete"))
    }

    async fn destroy_versions(&self, path: &str, versions: &[u64]) -> Result<()> {
        kv2::destroy_versions(&self.client, &self.mount_path, path, versions.to_vec())
            .await
            .map_err(|e| self.map_error(e, path, "destroy"))
    }

    async fn delete_metadata(&self, path: &str) -> Result<()> {
        kv2::delete_metadata(&self.client, &self.mount_path, path)
            .await
            .map_err(|e| self.map_error(e, path, "metadata delete"))?;

        tracing::info!(path = %path, address = %self.address, "Permanently destroyed secret in Vault");
        Ok(())
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        match kv2::list(&self.client, &self.mount_path, path).await {
            Ok(keys) => Ok(keys),
            // Vault answers 404 for a folder with no children
            Err(ClientError::APIError { code: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(self.map_error(e, path, "list")),
        }
    }

    async fn patch_metadata(&self, path: &str, changes: &CustomMetadata) -> Result<()> {
        // The metadata endpoint replaces custom_metadata wholesale, so merge first.
        let mut merged: HashMap<String, String> = match self.read_metadata(path).await {
            Ok(existing) => existing.custom_metadata.into_iter().collect(),
            Err(e) if e.is_not_found() => HashMap::new(),
            Err(e) => return Err(e),
        };
        for (key, value) in changes {
            merged.insert(key.clone(), value.clone());
        }

        let mut opts = SetSecretMetadataRequestBuilder::default();
        opts.custom_metadata(merged);
        kv2::set_metadata(&self.client, &self.mount_path, path, Some(&mut opts))
            .await
            .map_err(|e| self.map_error(e, path, "metadata update"))
    }

    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Vault
    }
}

/// Token taken from `VAULT_TOKEN`, if set.
pub fn token_from_env() -> Option<SecretString> {
    std::env::var("VAULT_TOKEN").ok().filter(|t| !t.is_empty()).map(SecretString::new)
}
