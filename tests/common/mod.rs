//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use kvmirror::config::EngineConfig;
use kvmirror::engine::{AutoConfirm, ConfirmationPrompt, FixedClock, SecretEngine};
use kvmirror::secrets::{
    CustomMetadata, InMemoryBackend, ReplicaSet, SecretBackend, SecretBackendType, SecretData,
    SecretMetadata, SecretPath,
};

pub const PLATFORM: &str = "platform-a";

/// Engine over one in-memory replica, with handles on its collaborators.
pub struct Harness {
    pub engine: SecretEngine,
    pub backend: Arc<InMemoryBackend>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_prompt(Arc::new(AutoConfirm))
    }

    pub fn with_prompt(prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        Self::build(Arc::new(InMemoryBackend::new()), prompt)
    }

    pub fn with_backend(backend: InMemoryBackend) -> Self {
        Self::build(Arc::new(backend), Arc::new(AutoConfirm))
    }

    fn build(backend: Arc<InMemoryBackend>, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        let clock = Arc::new(FixedClock::new(start_time()));
        let engine = SecretEngine::new(ReplicaSet::single(backend.clone()), config())
            .with_clock(clock.clone())
            .with_prompt(prompt);
        Self { engine, backend, clock }
    }

    pub fn path(&self, name: &str) -> SecretPath {
        self.engine.secret_path(name).unwrap()
    }

    /// Create `name` with `pairs` and the required metadata.
    pub async fn create(&self, name: &str, pairs: &[(&str, &str)]) -> SecretPath {
        let path = self.path(name);
        self.engine.create(&path, data(pairs), metadata()).await.unwrap();
        path
    }

    pub async fn primary_metadata(&self, path: &SecretPath) -> Option<SecretMetadata> {
        self.backend.read_metadata(path.primary()).await.ok()
    }

    pub async fn mirror_metadata(&self, path: &SecretPath) -> Option<SecretMetadata> {
        self.backend.read_metadata(&path.mirror("ci")).await.ok()
    }

    pub async fn mirror_data(&self, path: &SecretPath, version: u64) -> SecretData {
        self.backend.read_data(&path.mirror("ci"), version).await.unwrap()
    }

    /// Append a primary version without touching the mirror.
    pub async fn write_primary_only(&self, path: &SecretPath, pairs: &[(&str, &str)]) -> u64 {
        self.backend.write_version(path.primary(), &data(pairs), None).await.unwrap()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn config() -> EngineConfig {
    EngineConfig {
        platform: PLATFORM.to_string(),
        backend: SecretBackendType::Memory,
        ..EngineConfig::default()
    }
}

pub fn data(pairs: &[(&str, &str)]) -> SecretData {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn metadata() -> CustomMetadata {
    [("owner", "payments-team"), ("source", "manual"), ("usage", "database login")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
