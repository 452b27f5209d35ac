//! Secret backend trait.
//!
//! Defines the interface the engine needs from one versioned KV endpoint.
//! Several equivalent endpoints are combined by [`ReplicaSet`](super::ReplicaSet).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::Result;
use super::types::{CustomMetadata, SecretData, SecretMetadata};

/// Type of secret backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecretBackendType {
    /// HashiCorp Vault KV v2
    #[default]
    Vault,
    /// In-process store with KV v2 semantics
    Memory,
}

impl SecretBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for SecretBackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "vault" => Ok(Self::Vault),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown secret backend type: {}", s)),
        }
    }
}

impl fmt::Display for SecretBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One handle onto a versioned KV store.
///
/// Paths are physical paths relative to the KV mount. Implementations must be
/// Send + Sync for use in async contexts and MUST NOT log secret values.
#[async_trait]
pub trait SecretBackend: Send + Sync + fmt::Debug {
    /// Address used to identify this replica in errors and logs.
    fn address(&self) -> &str;

    /// Read the metadata record of `path`.
    ///
    /// Returns [`SecretsError::NotFound`](super::SecretsError::NotFound) when
    /// the path has never been written.
    async fn read_metadata(&self, path: &str) -> Result<SecretMetadata>;

    /// Read the data of one version.
    ///
    /// Returns `NotFound` when the version is absent, deleted or destroyed.
    async fn read_data(&self, path: &str, version: u64) -> Result<SecretData>;

    /// Append a new version and return its number.
    ///
    /// When `cas` is set the write only succeeds if the path's current version
    /// equals it (`0` meaning "path must not exist yet"); otherwise
    /// [`SecretsError::Conflict`](super::SecretsError::Conflict) is returned.
    async fn write_version(&self, path: &str, data: &SecretData, cas: Option<u64>) -> Result<u64>;

    /// Soft-delete versions. Absent or already deleted versions are ignored.
    async fn soft_delete(&self, path: &str, versions: &[u64]) -> Result<()>;

    /// Reverse soft-deletes. Absent or live versions are ignored.
    async fn undelete(&self, path: &str, versions: &[u64]) -> Result<()>;

    /// Permanently destroy the data of specific versions.
    async fn destroy_versions(&self, path: &str, versions: &[u64]) -> Result<()>;

    /// Irrecoverably remove the path: metadata and every version.
    async fn delete_metadata(&self, path: &str) -> Result<()>;

    /// List the direct children of `path`; folders carry a trailing `/`.
    ///
    /// Returns an empty list for a path with no children.
    async fn list_children(&self, path: &str) -> Result<Vec<String>>;

    /// Merge `changes` into the path's custom metadata.
    async fn patch_metadata(&self, path: &str, changes: &CustomMetadata) -> Result<()>;

    /// Get the backend type identifier
    fn backend_type(&self) -> SecretBackendType;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_roundtrip() {
        for bt in [SecretBackendType::Vault, SecretBackendType::Memory] {
            let parsed: SecretBackendType = bt.as_str().parse().unwrap();
            assert_eq!(bt, parsed);
        }
        assert!("consul".parse::<SecretBackendType>().is_err());
    }

    #[test]
    fn test_backend_type_serialization() {
        let json = serde_json::to_string(&SecretBackendType::Memory).unwrap();
        assert_eq!(json, "\"memory\"");
        let parsed: SecretBackendType = serde_json::from_str("\"vault\"").unwrap();
        assert_eq!(parsed, SecretBackendType::Vault);
    }
}
