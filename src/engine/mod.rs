//! # Secret Engine
//!
//! Versioned secret lifecycle with a blank mirror tree kept in lock-step.
//!
//! The engine owns no global state. Everything it needs arrives through
//! [`SecretEngine`]: the replica set it writes to, the [`EngineConfig`],
//! a [`Clock`] and a [`ConfirmationPrompt`].
//!
//! - [`resolver`]: latest readable version of a path
//! - [`mirror`]: blank mirror payloads and ordered mirror writes
//! - [`lifecycle`]: create, update, get, delete, undelete, destroy
//! - [`auditor`]: tree listing and drift detection
//! - [`reconciler`]: single-version repair and bulk resync
//! - [`sweeper`]: permanent removal of secrets past their destroy date

pub mod auditor;
pub mod clock;
pub mod confirm;
pub mod lifecycle;
pub mod locks;
pub mod mirror;
pub mod reconciler;
pub mod resolver;
pub mod sweeper;

pub use auditor::{DriftInfo, SyncReport, TreeSnapshot};
pub use clock::{Clock, FixedClock, SystemClock};
pub use confirm::{AutoConfirm, ConfirmationPrompt, DeclineAll, ScriptedPrompt};
pub use lifecycle::{DestroyOutcome, MetadataView};
pub use locks::{PathGuard, PathLocks};
pub use mirror::derive_mirror;
pub use reconciler::{ResyncAllReport, ResyncOutcome};
pub use resolver::latest_live_version;
pub use sweeper::SweepReport;

use std::sync::Arc;
use tracing::info;

use crate::config::EngineConfig;
use crate::observability::OperationMetrics;
use crate::secrets::{
    InMemoryBackend, ReplicaSet, Result, SecretBackend, SecretBackendType, SecretPath,
    SecretsError, VaultReplica,
};

/// Drives lifecycle, audit, repair and retention over one replica set.
#[derive(Debug)]
pub struct SecretEngine {
    replicas: ReplicaSet,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    prompt: Arc<dyn ConfirmationPrompt>,
    locks: PathLocks,
    metrics: OperationMetrics,
}

impl SecretEngine {
    /// Engine with the wall clock and a prompt that declines everything.
    pub fn new(replicas: ReplicaSet, config: EngineConfig) -> Self {
        Self {
            replicas,
            config,
            clock: Arc::new(SystemClock),
            prompt: Arc::new(DeclineAll),
            locks: PathLocks::new(),
            metrics: OperationMetrics::new(),
        }
    }

    /// Build the replica set described by `config` and wrap it in an engine.
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        let mut handles: Vec<Arc<dyn SecretBackend>> = Vec::new();
        match config.backend {
            SecretBackendType::Memory => {
                if config.replicas.is_empty() {
                    handles.push(Arc::new(InMemoryBackend::new()));
                }
                for replica in &config.replicas {
                    handles.push(Arc::new(InMemoryBackend::with_address(replica.address.clone())));
                }
            }
            SecretBackendType::Vault => {
                for replica in &config.replicas {
                    handles.push(Arc::new(VaultReplica::connect(replica, &config.mount_path).await?));
                }
            }
        }

        let replicas = ReplicaSet::new(handles)?;
        info!(
            backend = %config.backend,
            replicas = ?replicas.addresses(),
            "Secret engine connected"
        );
        Ok(Self::new(replicas, config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    /// Resolve a name relative to the configured platform scope.
    ///
    /// Names inside the mirror tree are rejected: the mirror is only ever
    /// written through its primary.
    pub fn secret_path(&self, name: &str) -> Result<SecretPath> {
        let path = SecretPath::join(self.config.platform_scope(), name)?;
        if path.is_mirror(&self.config.mirror_prefix) {
            return Err(SecretsError::invalid_path(
                path.as_str(),
                format!("paths under '{}' are managed by the engine", self.config.mirror_prefix),
            ));
        }
        Ok(path)
    }

    /// Scope to scan when the caller gives none.
    pub fn default_scope(&self) -> &str {
        self.config.platform_scope()
    }

    pub(crate) fn mirror_path(&self, path: &SecretPath) -> String {
        path.mirror(&self.config.mirror_prefix)
    }

    fn ask(&self, message: &str) -> Result<()> {
        if self.prompt.ask(message) {
            Ok(())
        } else {
            Err(SecretsError::ConfirmationDeclined)
        }
    }

    fn record<T>(&self, operation: &str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        self.metrics.record_operation(operation, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(platform: &str) -> SecretEngine {
        let config = EngineConfig { platform: platform.to_string(), ..EngineConfig::default() };
        SecretEngine::new(ReplicaSet::single(Arc::new(InMemoryBackend::new())), config)
    }

    #[test]
    fn test_secret_path_joins_platform() {
        let engine = engine("platform-a");
        assert_eq!(engine.secret_path("payments/db").unwrap().as_str(), "platform-a/payments/db");
        assert_eq!(
            engine.mirror_path(&engine.secret_path("db").unwrap()),
            "ci/platform-a/db"
        );
    }

    #[test]
    fn test_secret_path_rejects_mirror_tree() {
        let engine = engine("");
        let err = engine.secret_path("ci/platform-a/db").unwrap_err();
        assert!(matches!(err, SecretsError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = EngineConfig { backend: SecretBackendType::Memory, ..EngineConfig::default() };
        let engine = SecretEngine::connect(config).await.unwrap();
        assert_eq!(engine.replicas().addresses(), vec!["memory://local"]);
    }

    #[test]
    fn test_default_prompt_declines() {
        let engine = engine("platform-a");
        assert!(matches!(engine.ask("sure?"), Err(SecretsError::ConfirmationDeclined)));
    }
}
