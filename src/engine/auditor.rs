//! Tree listing and drift detection between primary and mirror.
//!
//! Auditing only reads. Per-path failures are collected in the report so
//! one unreadable secret does not hide drift on the others.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn, Instrument};

use crate::secrets::{Result, SecretMetadata, SecretPath, VersionState};
use crate::sweep_span;

use super::SecretEngine;

/// One tree's view of a path. `current_version` is `None` when the path is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    pub current_version: Option<u64>,
    pub versions: BTreeMap<u64, VersionState>,
}

impl From<Option<SecretMetadata>> for TreeSnapshot {
    fn from(metadata: Option<SecretMetadata>) -> Self {
        match metadata {
            Some(m) => Self { current_version: Some(m.current_version), versions: m.versions },
            None => Self::default(),
        }
    }
}

/// Both sides of a drifted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftInfo {
    pub primary: TreeSnapshot,
    pub mirror: TreeSnapshot,
    /// Versions whose presence or deletion state differs, ascending.
    pub drifted_versions: Vec<u64>,
}

impl DriftInfo {
    /// Compare two trees; `None` when they agree.
    pub fn compare(primary: TreeSnapshot, mirror: TreeSnapshot) -> Option<Self> {
        let all_versions: BTreeSet<u64> =
            primary.versions.keys().chain(mirror.versions.keys()).copied().collect();

        let drifted_versions: Vec<u64> = all_versions
            .into_iter()
            .filter(|v| match (primary.versions.get(v), mirror.versions.get(v)) {
                (Some(p), Some(m)) => !p.same_deletion_state(m),
                _ => true,
            })
            .collect();

        let same_current = primary.current_version.is_some()
            && primary.current_version == mirror.current_version;
        if same_current && drifted_versions.is_empty() {
            None
        } else {
            Some(Self { primary, mirror, drifted_versions })
        }
    }
}

/// Result of a drift scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub scope: String,
    /// Logical paths examined.
    pub scanned: usize,
    pub drift: BTreeMap<SecretPath, DriftInfo>,
    /// Paths or folders that could not be read, with the cause.
    pub errors: BTreeMap<String, String>,
}

impl SyncReport {
    pub fn is_in_sync(&self) -> bool {
        self.drift.is_empty() && self.errors.is_empty()
    }
}

impl SecretEngine {
    /// Every primary secret under `scope`, mirror tree excluded.
    pub async fn list(&self, scope: &str) -> Result<Vec<SecretPath>> {
        let (paths, errors) = self.walk(scope).await?;
        for (folder, cause) in &errors {
            warn!(folder = %folder, error = %cause, "Skipped unreadable folder");
        }
        Ok(paths.into_iter().filter(|p| !p.is_mirror(&self.config.mirror_prefix)).collect())
    }

    /// Report every logical path under `scope` whose mirror disagrees with its primary.
    pub async fn check_sync(&self, scope: &str) -> Result<SyncReport> {
        let span = sweep_span!("check_sync", scope);
        let result = self.check_sync_inner(scope).instrument(span).await;
        self.record("check_sync", &result);
        result
    }

    async fn check_sync_inner(&self, scope: &str) -> Result<SyncReport> {
        let prefix = self.config.mirror_prefix.trim_matches('/').to_string();
        let scope = scope.trim_matches('/');
        let mut report = SyncReport { scope: scope.to_string(), ..SyncReport::default() };

        let (primary_paths, primary_errors) = self.walk(scope).await?;
        report.errors.extend(primary_errors);

        let mirror_root =
            if scope.is_empty() { prefix.clone() } else { format!("{}/{}", prefix, scope) };
        let (mirror_paths, mirror_errors) = self.walk(&mirror_root).await?;
        report.errors.extend(mirror_errors);

        let logical: BTreeSet<SecretPath> = primary_paths
            .into_iter()
            .chain(mirror_paths)
            .map(|p| p.logical(&prefix))
            .collect();

        for path in logical {
            report.scanned += 1;
            let primary = match self.replicas.read_metadata(path.primary()).await {
                Ok(m) => m,
                Err(e) => {
                    report.errors.insert(path.to_string(), e.to_string());
                    continue;
                }
            };
            let mirror = match self.replicas.read_metadata(&self.mirror_path(&path)).await {
                Ok(m) => m,
                Err(e) => {
                    report.errors.insert(path.to_string(), e.to_string());
                    continue;
                }
            };
            if primary.is_none() && mirror.is_none() {
                continue;
            }

            if let Some(drift) = DriftInfo::compare(primary.into(), mirror.into()) {
                warn!(path = %path, versions = ?drift.drifted_versions, "Mirror drift detected");
                report.drift.insert(path, drift);
            }
        }

        self.metrics.record_audit(report.scanned, report.drift.len());
        info!(
            scanned = report.scanned,
            drifted = report.drift.len(),
            errors = report.errors.len(),
            "Sync check complete"
        );
        Ok(report)
    }

    /// Depth-first walk of leaf paths under `root`.
    ///
    /// A missing `root` yields nothing. Any other failure to list `root` is an
    /// error; unreadable subfolders are returned alongside the leaves found
    /// elsewhere.
    pub(crate) async fn walk(
        &self,
        root: &str,
    ) -> Result<(Vec<SecretPath>, BTreeMap<String, String>)> {
        let root = root.trim_matches('/').to_string();
        let mut leaves = Vec::new();
        let mut errors = BTreeMap::new();

        let mut pending = vec![root.clone()];
        while let Some(folder) = pending.pop() {
            let children = match self.replicas.list_children(&folder).await {
                Ok(children) => children,
                Err(e) if folder == root && e.is_not_found() => continue,
                Err(e) if folder == root => return Err(e),
                Err(e) => {
                    errors.insert(format!("{}/", folder), e.to_string());
                    continue;
                }
            };

            for child in children {
                let joined = if folder.is_empty() {
                    child.clone()
                } else {
                    format!("{}/{}", folder, child)
                };
                if let Some(sub) = joined.strip_suffix('/') {
                    pending.push(sub.to_string());
                } else {
                    match SecretPath::parse(&joined) {
                        Ok(path) => leaves.push(path),
                        Err(e) => {
                            errors.insert(joined, e.to_string());
                        }
                    }
                }
            }
        }

        leaves.sort();
        Ok((leaves, errors))
    }
}
