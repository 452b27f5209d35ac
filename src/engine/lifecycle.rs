//! Lifecycle operations on a logical secret.
//!
//! Every mutation touches the primary first and the mirror second, through
//! the whole replica set. Failures are returned as they happen; replicas
//! already written are not rolled back and `resync` is the recovery path.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{info, Instrument};

use crate::secrets::{
    CustomMetadata, Result, SecretChanges, SecretData, SecretMetadata, SecretPath, SecretsError,
    VersionRecord,
};
use crate::secret_span;

use super::SecretEngine;

/// Date format of the destroy-not-before custom metadata value.
pub const DESTROY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Primary and mirror metadata side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataView {
    pub path: SecretPath,
    pub primary: Option<SecretMetadata>,
    pub mirror: Option<SecretMetadata>,
}

/// What a destroy request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestroyOutcome {
    pub path: SecretPath,
    /// Versions soft-deleted, highest first.
    pub deleted_versions: Vec<u64>,
    /// Earliest day the retention sweeper may remove the secret.
    pub destroy_after: NaiveDate,
}

impl SecretEngine {
    /// Create a new secret at `path` with version 1 in both trees.
    ///
    /// Fails with [`SecretsError::AlreadyExists`] when a readable version
    /// exists. A path whose versions are all deleted is re-created on top of
    /// its history.
    pub async fn create(
        &self,
        path: &SecretPath,
        data: SecretData,
        metadata: CustomMetadata,
    ) -> Result<u64> {
        let span = secret_span!("create", path, keys = data.len());
        let result = self.create_inner(path, data, metadata).instrument(span).await;
        self.record("create", &result);
        result
    }

    async fn create_inner(
        &self,
        path: &SecretPath,
        data: SecretData,
        metadata: CustomMetadata,
    ) -> Result<u64> {
        validate_data(&data)?;
        self.validate_metadata(&metadata)?;

        let _guard = self.locks.lock(path.primary()).await;

        let existing = self.replicas.read_metadata(path.primary()).await?;
        if let Some(version) = existing.as_ref().and_then(super::latest_live_version) {
            return Err(SecretsError::already_exists(path.as_str(), version));
        }
        let current = existing.map(|m| m.current_version).unwrap_or(0);
        self.ensure_mirror_at(path, current).await?;

        let version = self.replicas.write_version(path.primary(), &data, Some(current)).await?;
        self.write_mirror_version(path, version, &data).await?;
        self.replicas.patch_metadata(path.primary(), &metadata).await?;

        info!(version, keys = data.len(), "Secret created");
        Ok(version)
    }

    /// Apply `changes` to the latest readable version and append the result.
    ///
    /// `None` values remove the key; others insert or overwrite it.
    pub async fn update(&self, path: &SecretPath, changes: SecretChanges) -> Result<u64> {
        let span = secret_span!("update", path, changes = changes.len());
        let result = self.update_inner(path, changes).instrument(span).await;
        self.record("update", &result);
        result
    }

    async fn update_inner(&self, path: &SecretPath, changes: SecretChanges) -> Result<u64> {
        if changes.is_empty() {
            return Err(SecretsError::invalid_value("no changes given"));
        }
        for (key, value) in &changes {
            validate_key(key)?;
            if value.as_deref() == Some("") {
                return Err(SecretsError::invalid_value(format!("value for '{}' is empty", key)));
            }
        }

        let _guard = self.locks.lock(path.primary()).await;

        let metadata = self
            .replicas
            .read_metadata(path.primary())
            .await?
            .ok_or_else(|| SecretsError::not_found(path.as_str()))?;
        let latest = super::latest_live_version(&metadata)
            .ok_or_else(|| SecretsError::not_found(path.as_str()))?;
        self.ensure_mirror_at(path, metadata.current_version).await?;

        let mut merged = self.replicas.read_data(path.primary(), latest).await?;
        apply_changes(&mut merged, changes);

        let version = self
            .replicas
            .write_version(path.primary(), &merged, Some(metadata.current_version))
            .await?;
        self.write_mirror_version(path, version, &merged).await?;

        info!(from = latest, version, keys = merged.len(), "Secret updated");
        Ok(version)
    }

    /// Read one primary version; `None` resolves the latest readable one.
    pub async fn get(&self, path: &SecretPath, version: Option<u64>) -> Result<VersionRecord> {
        let metadata = self
            .replicas
            .read_metadata(path.primary())
            .await?
            .ok_or_else(|| SecretsError::not_found(path.as_str()))?;
        let version = match version {
            Some(v) => v,
            None => super::latest_live_version(&metadata)
                .ok_or_else(|| SecretsError::not_found(path.as_str()))?,
        };
        let state = metadata
            .version(version)
            .cloned()
            .ok_or_else(|| SecretsError::not_found(format!("{}@{}", path, version)))?;

        let data = if state.is_live() {
            self.replicas.read_data(path.primary(), version).await?
        } else {
            SecretData::new()
        };
        Ok(VersionRecord { version, data, state })
    }

    /// Primary and mirror metadata for `path`.
    pub async fn metadata(&self, path: &SecretPath) -> Result<MetadataView> {
        let primary = self.replicas.read_metadata(path.primary()).await?;
        let mirror = self.replicas.read_metadata(&self.mirror_path(path)).await?;
        if primary.is_none() && mirror.is_none() {
            return Err(SecretsError::not_found(path.as_str()));
        }
        Ok(MetadataView { path: path.clone(), primary, mirror })
    }

    /// Soft-delete `version` (or the latest readable one) in both trees.
    ///
    /// Returns the version acted on, or `None` when nothing was readable.
    /// Deleting a missing or already deleted version is not an error.
    pub async fn delete(
        &self,
        path: &SecretPath,
        version: Option<u64>,
        assume_yes: bool,
    ) -> Result<Option<u64>> {
        let span = secret_span!("delete", path, version = ?version);
        let result = self.delete_inner(path, version, assume_yes).instrument(span).await;
        self.record("delete", &result);
        result
    }

    async fn delete_inner(
        &self,
        path: &SecretPath,
        version: Option<u64>,
        assume_yes: bool,
    ) -> Result<Option<u64>> {
        let version = match version {
            Some(v) => v,
            None => match self.get_latest_version(path).await? {
                Some(v) => v,
                None => {
                    info!("No readable version to delete");
                    return Ok(None);
                }
            },
        };

        if !assume_yes {
            self.ask(&format!("Delete version {} of '{}'?", version, path))?;
        }

        let _guard = self.locks.lock(path.primary()).await;
        self.delete_version(path, version).await?;
        info!(version, "Secret version deleted");
        Ok(Some(version))
    }

    /// Reverse a soft-delete of `version` in both trees.
    pub async fn undelete(&self, path: &SecretPath, version: u64, assume_yes: bool) -> Result<()> {
        let span = secret_span!("undelete", path, version);
        let result = self.undelete_inner(path, version, assume_yes).instrument(span).await;
        self.record("undelete", &result);
        result
    }

    async fn undelete_inner(&self, path: &SecretPath, version: u64, assume_yes: bool) -> Result<()> {
        if !assume_yes {
            self.ask(&format!("Undelete version {} of '{}'?", version, path))?;
        }

        let _guard = self.locks.lock(path.primary()).await;
        self.replicas.undelete(path.primary(), &[version]).await.or_else(ignore_not_found)?;
        self.replicas.undelete(&self.mirror_path(path), &[version]).await.or_else(ignore_not_found)?;
        info!("Secret version undeleted");
        Ok(())
    }

    /// Delete every version above the oldest and schedule permanent removal.
    ///
    /// Always asks twice, whatever the caller's `--yes` preference. The
    /// oldest retained version is left alone. The destroy date lands on the
    /// primary's custom metadata only; the retention sweeper removes both
    /// trees once it has passed.
    pub async fn destroy(&self, path: &SecretPath) -> Result<DestroyOutcome> {
        let span = secret_span!("destroy", path);
        let result = self.destroy_inner(path).instrument(span).await;
        self.record("destroy", &result);
        result
    }

    async fn destroy_inner(&self, path: &SecretPath) -> Result<DestroyOutcome> {
        self.ask(&format!("Destroy '{}'? All versions will be deleted.", path))?;
        self.ask(&format!(
            "Really destroy '{}'? It is removed permanently after {} days.",
            path, self.config.destroy_grace_days
        ))?;

        let _guard = self.locks.lock(path.primary()).await;

        let metadata = self
            .replicas
            .read_metadata(path.primary())
            .await?
            .ok_or_else(|| SecretsError::not_found(path.as_str()))?;

        let mut deleted_versions = Vec::new();
        let mut version = metadata.current_version;
        while version > metadata.oldest_version {
            self.delete_version(path, version).await?;
            deleted_versions.push(version);
            version -= 1;
        }

        let destroy_after =
            self.clock.today() + Duration::days(i64::from(self.config.destroy_grace_days));
        let schedule: CustomMetadata = [(
            self.config.destroy_after_key.clone(),
            destroy_after.format(DESTROY_DATE_FORMAT).to_string(),
        )]
        .into_iter()
        .collect();
        self.replicas.patch_metadata(path.primary(), &schedule).await?;

        info!(deleted = ?deleted_versions, %destroy_after, "Secret scheduled for destruction");
        Ok(DestroyOutcome { path: path.clone(), deleted_versions, destroy_after })
    }

    /// Soft-delete one version in both trees. Caller holds the path lock.
    async fn delete_version(&self, path: &SecretPath, version: u64) -> Result<()> {
        self.replicas.soft_delete(path.primary(), &[version]).await.or_else(ignore_not_found)?;
        self.replicas
            .soft_delete(&self.mirror_path(path), &[version])
            .await
            .or_else(ignore_not_found)
    }

    fn validate_metadata(&self, metadata: &CustomMetadata) -> Result<()> {
        let missing: Vec<&str> = self
            .config
            .required_metadata
            .iter()
            .filter(|key| metadata.get(key.as_str()).map_or(true, |v| v.trim().is_empty()))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SecretsError::invalid_value(format!(
                "missing required metadata: {}",
                missing.join(", ")
            )))
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(SecretsError::invalid_value("keys cannot be empty"));
    }
    Ok(())
}

fn validate_data(data: &SecretData) -> Result<()> {
    if data.is_empty() {
        return Err(SecretsError::invalid_value("secret data cannot be empty"));
    }
    for (key, value) in data {
        validate_key(key)?;
        if value.is_empty() {
            return Err(SecretsError::invalid_value(format!("value for '{}' is empty", key)));
        }
    }
    Ok(())
}

/// Upsert `Some` values and remove keys mapped to `None`.
pub fn apply_changes(data: &mut SecretData, changes: SecretChanges) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                data.insert(key, value);
            }
            None => {
                data.remove(&key);
            }
        }
    }
}

fn ignore_not_found(err: SecretsError) -> Result<()> {
    if err.is_not_found() {
        Ok(())
    } else {
        Err(err)
    }
}
