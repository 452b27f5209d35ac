//! Single-version repair of mirror drift.
//!
//! `resync` looks at one version of one path and makes the mirror agree
//! with the primary on whether that version exists and whether it is
//! deleted. A second call on the same version is always a no-op.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn, Instrument};

use crate::secrets::{Result, SecretData, SecretPath, SecretsError};
use crate::{secret_span, sweep_span};

use super::auditor::SyncReport;
use super::SecretEngine;

/// What `resync` did to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncOutcome {
    /// Both trees already agreed.
    AlreadySynced,
    /// The mirror version was soft-deleted to match the primary.
    Deleted,
    /// A blank mirror version was written and immediately soft-deleted.
    CreatedAndDeleted,
    /// The mirror version was undeleted to match the primary.
    Undeleted,
    /// A mirror version was written from the primary's key set.
    Created,
}

impl ResyncOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::AlreadySynced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadySynced => "already synced",
            Self::Deleted => "resynchronized (deleted)",
            Self::CreatedAndDeleted => "resynchronized (created & deleted)",
            Self::Undeleted => "resynchronized (undeleted)",
            Self::Created => "resynchronized",
        }
    }
}

impl fmt::Display for ResyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resyncing every drifted version in a [`SyncReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncAllReport {
    /// Per path, each repaired version with its outcome, ascending.
    pub outcomes: BTreeMap<SecretPath, Vec<(u64, ResyncOutcome)>>,
    /// Paths whose repair stopped early, with the cause.
    pub errors: BTreeMap<SecretPath, String>,
}

impl SecretEngine {
    /// Bring the mirror's copy of `version` in line with the primary.
    pub async fn resync(&self, path: &SecretPath, version: u64) -> Result<ResyncOutcome> {
        let span = secret_span!("resync", path, version);
        let result = async {
            let _guard = self.locks.lock(path.primary()).await;
            self.resync_locked(path, version).await
        }
        .instrument(span)
        .await;
        self.record("resync", &result);
        result
    }

    async fn resync_locked(&self, path: &SecretPath, version: u64) -> Result<ResyncOutcome> {
        let primary = self
            .replicas
            .read_metadata(path.primary())
            .await?
            .ok_or_else(|| SecretsError::not_found(path.as_str()))?;
        let primary_state = primary
            .version(version)
            .cloned()
            .ok_or_else(|| SecretsError::not_found(format!("{}@{}", path, version)))?;
        let primary_deleted = primary_state.is_deleted();

        let mirror_path = self.mirror_path(path);
        let mirror_state = self
            .replicas
            .read_metadata(&mirror_path)
            .await?
            .and_then(|m| m.version(version).cloned());

        let outcome = match (primary_deleted, mirror_state) {
            (true, Some(mirror)) if mirror.is_deleted() => ResyncOutcome::AlreadySynced,
            (true, Some(_)) => {
                self.replicas.soft_delete(&mirror_path, &[version]).await?;
                ResyncOutcome::Deleted
            }
            (true, None) => {
                self.write_mirror_version(path, version, &SecretData::new()).await?;
                self.replicas.soft_delete(&mirror_path, &[version]).await?;
                ResyncOutcome::CreatedAndDeleted
            }
            (false, Some(mirror)) if mirror.destroyed => {
                return Err(SecretsError::conflict(
                    mirror_path,
                    format!("mirror version {} is destroyed and cannot be restored", version),
                ));
            }
            (false, Some(mirror)) if mirror.is_deleted() => {
                self.replicas.undelete(&mirror_path, &[version]).await?;
                ResyncOutcome::Undeleted
            }
            (false, Some(_)) => ResyncOutcome::AlreadySynced,
            (false, None) => {
                let data = self.replicas.read_data(path.primary(), version).await?;
                self.write_mirror_version(path, version, &data).await?;
                ResyncOutcome::Created
            }
        };

        info!(outcome = %outcome, "Resync finished");
        Ok(outcome)
    }

    /// Resync every drifted version in `report`, lowest version first.
    ///
    /// A failure stops that path, since later versions depend on earlier
    /// ones being in place, and the remaining paths still run.
    pub async fn resync_all(&self, report: &SyncReport) -> ResyncAllReport {
        let span = sweep_span!("resync_all", report.scope, paths = report.drift.len());
        async {
            let mut result = ResyncAllReport::default();
            for (path, drift) in &report.drift {
                let mut outcomes = Vec::new();
                for version in &drift.drifted_versions {
                    match self.resync(path, *version).await {
                        Ok(outcome) => outcomes.push((*version, outcome)),
                        Err(e) => {
                            warn!(path = %path, version, error = %e, "Resync stopped");
                            result.errors.insert(path.clone(), e.to_string());
                            break;
                        }
                    }
                }
                if !outcomes.is_empty() {
                    result.outcomes.insert(path.clone(), outcomes);
                }
            }
            info!(
                repaired = result.outcomes.len(),
                failed = result.errors.len(),
                "Bulk resync finished"
            );
            result
        }
        .instrument(span)
        .await
    }
}
