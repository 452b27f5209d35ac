//! Replica fan-out.
//!
//! Every logical write is applied to each configured replica in order. The
//! first failure aborts the write and is reported with the failing replica's
//! address; replicas that were already written are not rolled back, so a
//! partial write leaves them ahead of the rest until the operation is retried
//! or the path is resynchronized.
//!
//! Reads are served by the first replica only.

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error};

use super::backend::SecretBackend;
use super::error::{Result, SecretsError};
use super::types::{CustomMetadata, SecretData, SecretMetadata};

/// Ordered list of equivalent backend handles.
#[derive(Debug, Clone)]
pub struct ReplicaSet {
    replicas: Vec<Arc<dyn SecretBackend>>,
}

impl ReplicaSet {
    /// Build a replica set; at least one replica is required.
    pub fn new(replicas: Vec<Arc<dyn SecretBackend>>) -> Result<Self> {
        if replicas.is_empty() {
            return Err(SecretsError::config_error("at least one backend replica is required"));
        }
        Ok(Self { replicas })
    }

    pub fn single(replica: Arc<dyn SecretBackend>) -> Self {
        Self { replicas: vec![replica] }
    }

    /// The replica serving reads.
    pub fn reader(&self) -> &dyn SecretBackend {
        self.replicas[0].as_ref()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.replicas.iter().map(|r| r.address()).collect()
    }

    /// Read metadata, mapping "not found" to `None`.
    pub async fn read_metadata(&self, path: &str) -> Result<Option<SecretMetadata>> {
        match self.reader().read_metadata(path).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn read_data(&self, path: &str, version: u64) -> Result<SecretData> {
        self.reader().read_data(path, version).await
    }

    pub async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        self.reader().list_children(path).await
    }

    /// Write a new version to every replica.
    ///
    /// All replicas must assign the same version number; a replica that
    /// disagrees is reported as a write failure.
    pub async fn write_version(&self, path: &str, data: &SecretData, cas: Option<u64>) -> Result<u64> {
        let versions = self
            .fan_out("write_version", path, |replica| replica.write_version(path, data, cas))
            .await?;

        let assigned = versions[0];
        for (replica, version) in self.replicas.iter().zip(versions.iter()).skip(1) {
            if *version != assigned {
                error!(
                    path = %path,
                    replica = %replica.address(),
                    assigned = version,
                    expected = assigned,
                    "Replica assigned a different version number"
                );
                return Err(SecretsError::write_failure(
                    replica.address(),
                    format!("assigned version {} to '{}', expected {}", version, path, assigned),
                ));
            }
        }
        Ok(assigned)
    }

    pub async fn soft_delete(&self, path: &str, versions: &[u64]) -> Result<()> {
        self.fan_out("soft_delete", path, |replica| replica.soft_delete(path, versions)).await?;
        Ok(())
    }

    pub async fn undelete(&self, path: &str, versions: &[u64]) -> Result<()> {
        self.fan_out("undelete", path, |replica| replica.undelete(path, versions)).await?;
        Ok(())
    }

    pub async fn destroy_versions(&self, path: &str, versions: &[u64]) -> Result<()> {
        self.fan_out("destroy_versions", path, |replica| replica.destroy_versions(path, versions))
            .await?;
        Ok(())
    }

    pub async fn delete_metadata(&self, path: &str) -> Result<()> {
        self.fan_out("delete_metadata", path, |replica| replica.delete_metadata(path)).await?;
        Ok(())
    }

    pub async fn patch_metadata(&self, path: &str, changes: &CustomMetadata) -> Result<()> {
        self.fan_out("patch_metadata", path, |replica| replica.patch_metadata(path, changes))
            .await?;
        Ok(())
    }

    /// Apply `op` to each replica in order, failing fast.
    async fn fan_out<'a, T, F>(&'a self, operation: &str, path: &str, op: F) -> Result<Vec<T>>
    where
        F: Fn(&'a dyn SecretBackend) -> BoxFuture<'a, Result<T>>,
    {
        let mut results = Vec::with_capacity(self.replicas.len());
        for replica in &self.replicas {
            match op(replica.as_ref()).await {
                Ok(value) => {
                    debug!(operation, path = %path, replica = %replica.address(), "Replica write applied");
                    results.push(value);
                }
                Err(e) => {
                    error!(
                        operation,
                        path = %path,
                        replica = %replica.address(),
                        error = %e,
                        "Replica write failed"
                    );
                    return Err(attribute_to_replica(replica.address(), e));
                }
            }
        }
        Ok(results)
    }
}

fn attribute_to_replica(address: &str, err: SecretsError) -> SecretsError {
    match err {
        SecretsError::Conflict { path, message } => {
            SecretsError::conflict(path, format!("{} (replica {})", message, address))
        }
        SecretsError::BackendWriteFailure { .. } => err,
        other => SecretsError::write_failure(address, other.to_string()),
    }
}
