//! In-memory secret backend.
//!
//! Reproduces KV v2 semantics in process: per-path version history, soft
//! delete, undelete, destroy, check-and-set writes, custom metadata and
//! folder-style listing. Used for development (`backend = "memory"`) and as
//! the backend of the engine's test-suite.
//!
//! Every mutating call is appended to a journal so callers can assert which
//! writes an operation issued.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{SecretBackend, SecretBackendType};
use super::error::{Result, SecretsError};
use super::types::{CustomMetadata, SecretData, SecretMetadata, VersionState};

/// A mutating call recorded by [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub operation: &'static str,
    pub path: String,
    pub versions: Vec<u64>,
}

#[derive(Debug, Default)]
struct Entry {
    metadata: SecretMetadata,
    data: BTreeMap<u64, SecretData>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    journal: Vec<JournalEntry>,
}

/// Versioned KV store held in memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    address: String,
    max_versions: Option<u64>,
    state: RwLock<State>,
    fail_writes: AtomicBool,
    fail_once: Mutex<BTreeSet<String>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_address("memory://local")
    }

    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            max_versions: None,
            state: RwLock::new(State::default()),
            fail_writes: AtomicBool::new(false),
            fail_once: Mutex::new(BTreeSet::new()),
        }
    }

    /// Keep at most `max` versions per path, trimming the oldest on write.
    pub fn with_max_versions(mut self, max: u64) -> Self {
        self.max_versions = Some(max.max(1));
        self
    }

    /// Make every subsequent mutating call fail (replica outage simulation).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next mutating call on exactly `path` fail.
    pub fn fail_next_write_to(&self, path: impl Into<String>) {
        if let Ok(mut paths) = self.fail_once.lock() {
            paths.insert(path.into());
        }
    }

    /// Mutating calls issued so far, oldest first.
    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.state.read().await.journal.clone()
    }

    pub async fn clear_journal(&self) {
        self.state.write().await.journal.clear();
    }

    /// All physical paths currently stored, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut paths: Vec<String> = state.entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn check_writable(&self, path: &str) -> Result<()> {
        let injected = self.fail_once.lock().map(|mut paths| paths.remove(path)).unwrap_or(false);
        if injected || self.fail_writes.load(Ordering::SeqCst) {
            return Err(SecretsError::backend_error(format!(
                "replica {} rejected write to '{}'",
                self.address, path
            )));
        }
        Ok(())
    }

    fn record(state: &mut State, operation: &'static str, path: &str, versions: &[u64]) {
        state.journal.push(JournalEntry {
            operation,
            path: path.to_string(),
            versions: versions.to_vec(),
        });
    }

    fn trim(entry: &mut Entry, max_versions: u64) {
        while entry.metadata.versions.len() as u64 > max_versions {
            let Some(oldest) = entry.metadata.versions.keys().next().copied() else {
                break;
            };
            entry.metadata.versions.remove(&oldest);
            entry.data.remove(&oldest);
        }
        entry.metadata.oldest_version =
            entry.metadata.versions.keys().next().copied().unwrap_or(0);
    }
}

#[async_trait]
impl SecretBackend for InMemoryBackend {
    fn address(&self) -> &str {
        &self.address
    }

    async fn read_metadata(&self, path: &str) -> Result<SecretMetadata> {
        let state = self.state.read().await;
        state
            .entries
            .get(path)
            .map(|entry| entry.metadata.clone())
            .ok_or_else(|| SecretsError::not_found(path))
    }

    async fn read_data(&self, path: &str, version: u64) -> Result<SecretData> {
        let state = self.state.read().await;
        let entry = state.entries.get(path).ok_or_else(|| SecretsError::not_found(path))?;
        match entry.metadata.version(version) {
            Some(v) if v.is_live() => entry
                .data
                .get(&version)
                .cloned()
                .ok_or_else(|| SecretsError::not_found(format!("{}@{}", path, version))),
            _ => Err(SecretsError::not_found(format!("{}@{}", path, version))),
        }
    }

    async fn write_version(&self, path: &str, data: &SecretData, cas: Option<u64>) -> Result<u64> {
        self.check_writable(path)?;
        let mut state = self.state.write().await;

        let current = state.entries.get(path).map(|e| e.metadata.current_version).unwrap_or(0);
        if let Some(expected) = cas {
            if expected != current {
                return Err(SecretsError::conflict(
                    path,
                    format!("check-and-set expected version {}, current is {}", expected, current),
                ));
            }
        }

        let version = current + 1;
        let entry = state.entries.entry(path.to_string()).or_default();
        entry.metadata.current_version = version;
        entry.metadata.versions.insert(version, VersionState::live(Utc::now()));
        entry.data.insert(version, data.clone());
        if entry.metadata.oldest_version == 0 {
            entry.metadata.oldest_version = version;
        }
        if let Some(max) = self.max_versions {
            Self::trim(entry, max);
        }

        Self::record(&mut state, "write_version", path, &[version]);
        debug!(path = %path, version, keys = data.len(), "In-memory version written");
        Ok(version)
    }

    async fn soft_delete(&self, path: &str, versions: &[u64]) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.state.write().await;
        if let Some(entry) = state.entries.get_mut(path) {
            let now = Utc::now();
            for version in versions {
                if let Some(v) = entry.metadata.versions.get_mut(version) {
                    if v.deletion_time.is_none() && !v.destroyed {
                        v.deletion_time = Some(now);
                    }
                }
            }
        }
        Self::record(&mut state, "soft_delete", path, versions);
        Ok(())
    }

    async fn undelete(&self, path: &str, versions: &[u64]) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.state.write().await;
        if let Some(entry) = state.entries.get_mut(path) {
            for version in versions {
                if let Some(v) = entry.metadata.versions.get_mut(version) {
                    if !v.destroyed {
                        v.deletion_time = None;
                    }
                }
            }
        }
        Self::record(&mut state, "undelete", path, versions);
        Ok(())
    }

    async fn destroy_versions(&self, path: &str, versions: &[u64]) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.state.write().await;
        if let Some(entry) = state.entries.get_mut(path) {
            for version in versions {
                if let Some(v) = entry.metadata.versions.get_mut(version) {
                    v.destroyed = true;
                    entry.data.remove(version);
                }
            }
        }
        Self::record(&mut state, "destroy_versions", path, versions);
        Ok(())
    }

    async fn delete_metadata(&self, path: &str) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.state.write().await;
        state.entries.remove(path);
        Self::record(&mut state, "delete_metadata", path, &[]);
        Ok(())
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let prefix = match path.trim_matches('/') {
            "" => String::new(),
            p => format!("{}/", p),
        };

        let children: BTreeSet<String> = state
            .entries
            .keys()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty())
            .map(|rest| match rest.split_once('/') {
                Some((folder, _)) => format!("{}/", folder),
                None => rest.to_string(),
            })
            .collect();

        Ok(children.into_iter().collect())
    }

    async fn patch_metadata(&self, path: &str, changes: &CustomMetadata) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.state.write().await;
        let entry = state.entries.entry(path.to_string()).or_default();
        for (key, value) in changes {
            entry.metadata.custom_metadata.insert(key.clone(), value.clone());
        }
        Self::record(&mut state, "patch_metadata", path, &[]);
        Ok(())
    }

    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> SecretData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_versions_increase_and_read_back() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.write_version("a/b", &data(&[("k", "1")]), None).await.unwrap(), 1);
        assert_eq!(backend.write_version("a/b", &data(&[("k", "2")]), None).await.unwrap(), 2);

        let metadata = backend.read_metadata("a/b").await.unwrap();
        assert_eq!(metadata.current_version, 2);
        assert_eq!(metadata.oldest_version, 1);
        assert_eq!(backend.read_data("a/b", 1).await.unwrap(), data(&[("k", "1")]));
    }

    #[tokio::test]
    async fn test_check_and_set_rejects_stale_writes() {
        let backend = InMemoryBackend::new();
        backend.write_version("a", &data(&[("k", "v")]), Some(0)).await.unwrap();

        let err = backend.write_version("a", &data(&[("k", "v2")]), Some(0)).await.unwrap_err();
        assert!(matches!(err, SecretsError::Conflict { .. }));
        assert_eq!(backend.write_version("a", &data(&[("k", "v2")]), Some(1)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_soft_delete_and_undelete() {
        let backend = InMemoryBackend::new();
        backend.write_version("a", &data(&[("k", "v")]), None).await.unwrap();

        backend.soft_delete("a", &[1, 7]).await.unwrap();
        assert!(backend.read_data("a", 1).await.unwrap_err().is_not_found());
        assert!(backend.read_metadata("a").await.unwrap().versions[&1].deletion_time.is_some());

        backend.undelete("a", &[1]).await.unwrap();
        assert_eq!(backend.read_data("a", 1).await.unwrap(), data(&[("k", "v")]));
    }

    #[tokio::test]
    async fn test_destroyed_versions_cannot_be_undeleted() {
        let backend = InMemoryBackend::new();
        backend.write_version("a", &data(&[("k", "v")]), None).await.unwrap();
        backend.destroy_versions("a", &[1]).await.unwrap();
        backend.undelete("a", &[1]).await.unwrap();

        let metadata = backend.read_metadata("a").await.unwrap();
        assert!(metadata.versions[&1].destroyed);
        assert!(backend.read_data("a", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_list_children_reports_folders() {
        let backend = InMemoryBackend::new();
        for path in ["p/app/db", "p/app/api", "p/web", "ci/p/web", "other/x"] {
            backend.write_version(path, &data(&[("k", "v")]), None).await.unwrap();
        }

        assert_eq!(backend.list_children("").await.unwrap(), vec!["ci/", "other/", "p/"]);
        assert_eq!(backend.list_children("p").await.unwrap(), vec!["app/", "web"]);
        assert_eq!(backend.list_children("p/app/").await.unwrap(), vec!["api", "db"]);
        assert!(backend.list_children("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_max_versions_moves_oldest() {
        let backend = InMemoryBackend::new().with_max_versions(2);
        for i in 0..4 {
            backend.write_version("a", &data(&[("k", &i.to_string())]), None).await.unwrap();
        }
        let metadata = backend.read_metadata("a").await.unwrap();
        assert_eq!(metadata.current_version, 4);
        assert_eq!(metadata.oldest_version, 3);
        assert_eq!(metadata.versions.len(), 2);
    }

    #[tokio::test]
    async fn test_journal_records_mutations_only() {
        let backend = InMemoryBackend::new();
        backend.write_version("a", &data(&[("k", "v")]), None).await.unwrap();
        backend.read_metadata("a").await.unwrap();
        backend.list_children("").await.unwrap();
        backend.delete_metadata("a").await.unwrap();

        let ops: Vec<&str> = backend.journal().await.iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec!["write_version", "delete_metadata"]);
    }

    #[tokio::test]
    async fn test_failing_replica_rejects_writes() {
        let backend = InMemoryBackend::with_address("mem://down");
        backend.fail_writes(true);
        let err = backend.write_version("a", &data(&[("k", "v")]), None).await.unwrap_err();
        assert!(err.to_string().contains("mem://down"));
        assert!(backend.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once_for_its_path() {
        let backend = InMemoryBackend::new();
        backend.fail_next_write_to("b");

        backend.write_version("a", &data(&[("k", "v")]), None).await.unwrap();
        assert!(backend.write_version("b", &data(&[("k", "v")]), None).await.is_err());
        assert_eq!(backend.write_version("b", &data(&[("k", "v")]), None).await.unwrap(), 1);
    }
}
