//! Versioned secret storage seen through one or more backend replicas.
//!
//! This module holds the data model shared by the engine and the backend
//! collaborators it drives:
//!
//! - [`SecretBackend`]: one handle onto a KV store with versioned semantics
//!   (read metadata, read a version, append, soft-delete, undelete, destroy,
//!   list, patch custom metadata)
//! - [`ReplicaSet`]: ordered fan-out of writes over equivalent handles
//! - [`InMemoryBackend`]: KV v2 semantics in process, for development and tests
//! - [`VaultReplica`]: HashiCorp Vault KV v2 through `vaultrs`
//!
//! # Example
//!
//! ```rust,ignore
//! use kvmirror::secrets::{InMemoryBackend, ReplicaSet, SecretBackend};
//! use std::sync::Arc;
//!
//! let replicas = ReplicaSet::new(vec![
//!     Arc::new(InMemoryBackend::with_address("mem://eu")),
//!     Arc::new(InMemoryBackend::with_address("mem://us")),
//! ])?;
//! let version = replicas.write_version("platform-a/db", &data, Some(0)).await?;
//! ```
//!
//! # Security Considerations
//!
//! - Secret values are never logged or placed in error messages
//! - Replica tokens are wrapped in [`SecretString`]

pub mod backend;
pub mod error;
pub mod memory;
pub mod replicas;
pub mod types;
pub mod vault;

pub use backend::{SecretBackend, SecretBackendType};
pub use error::{Result, SecretsError};
pub use memory::{InMemoryBackend, JournalEntry};
pub use replicas::ReplicaSet;
pub use types::{
    CustomMetadata, SecretChanges, SecretData, SecretMetadata, SecretPath, SecretString,
    VersionRecord, VersionState,
};
pub use vault::VaultReplica;
