//! Permanent removal of secrets whose destroy date has passed.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn, Instrument};

use crate::secrets::{Result, SecretMetadata, SecretPath};
use crate::sweep_span;

use super::lifecycle::DESTROY_DATE_FORMAT;
use super::SecretEngine;

/// Result of a retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scope: String,
    pub dry_run: bool,
    /// Primary secrets examined.
    pub scanned: usize,
    /// Secrets whose destroy date is today or earlier.
    pub eligible: Vec<SecretPath>,
    /// Secrets removed from both trees. Always empty on a dry run.
    pub destroyed: Vec<SecretPath>,
    pub errors: BTreeMap<String, String>,
}

impl SecretEngine {
    /// Permanently remove every secret under `scope` whose destroy date has passed.
    ///
    /// Both the primary and the mirror metadata are deleted, which drops all
    /// versions irrecoverably. With `dry_run` nothing is written and the
    /// report lists what would have been removed.
    pub async fn clean(&self, scope: &str, dry_run: bool) -> Result<SweepReport> {
        let span = sweep_span!("clean", scope, dry_run);
        let result = self.clean_inner(scope, dry_run).instrument(span).await;
        self.record("clean", &result);
        result
    }

    async fn clean_inner(&self, scope: &str, dry_run: bool) -> Result<SweepReport> {
        let today = self.clock.today();
        let mut report =
            SweepReport { scope: scope.trim_matches('/').to_string(), dry_run, ..Default::default() };

        let (paths, walk_errors) = self.walk(scope).await?;
        report.errors.extend(walk_errors);

        for path in paths.into_iter().filter(|p| !p.is_mirror(&self.config.mirror_prefix)) {
            report.scanned += 1;
            match self.replicas.read_metadata(path.primary()).await {
                Ok(Some(metadata)) if self.is_due(&path, &metadata, today) => {
                    report.eligible.push(path);
                }
                Ok(_) => {}
                Err(e) => {
                    report.errors.insert(path.to_string(), e.to_string());
                }
            }
        }

        if dry_run {
            info!(eligible = report.eligible.len(), "Dry run: nothing destroyed");
            return Ok(report);
        }

        for path in &report.eligible {
            match self.destroy_permanently(path, today).await {
                Ok(true) => report.destroyed.push(path.clone()),
                Ok(false) => debug!(path = %path, "No longer due, skipped"),
                Err(e) => {
                    warn!(path = %path, error = %e, "Permanent destroy failed");
                    report.errors.insert(path.to_string(), e.to_string());
                }
            }
        }

        self.metrics.record_destroyed(report.destroyed.len());
        info!(
            scanned = report.scanned,
            destroyed = report.destroyed.len(),
            errors = report.errors.len(),
            "Retention sweep complete"
        );
        Ok(report)
    }

    /// Re-check the schedule under the path lock, then delete both trees.
    async fn destroy_permanently(&self, path: &SecretPath, today: NaiveDate) -> Result<bool> {
        let _guard = self.locks.lock(path.primary()).await;

        let Some(metadata) = self.replicas.read_metadata(path.primary()).await? else {
            return Ok(false);
        };
        if !self.is_due(path, &metadata, today) {
            return Ok(false);
        }

        // Primary last: it keeps the path visible to the next sweep.
        self.replicas.delete_metadata(&self.mirror_path(path)).await?;
        self.replicas.delete_metadata(path.primary()).await?;
        info!(path = %path, "Secret permanently destroyed");
        Ok(true)
    }

    fn is_due(&self, path: &SecretPath, metadata: &SecretMetadata, today: NaiveDate) -> bool {
        let Some(raw) = metadata.custom_metadata.get(&self.config.destroy_after_key) else {
            return false;
        };
        match parse_destroy_date(raw) {
            Some(date) => date <= today,
            None => {
                warn!(path = %path, value = %raw, "Ignoring unparseable destroy date");
                false
            }
        }
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_destroy_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DESTROY_DATE_FORMAT)
        .ok()
        .or_else(|| chrono::DateTime::parse_from_rfc3339(raw).ok().map(|t| t.date_naive()))
}
