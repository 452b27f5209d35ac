//! # kvmirror
//!
//! Versioned secret lifecycle over a KV v2 store, with every secret shadowed
//! by a blank mirror under `ci/` that CI systems can read to discover which
//! keys exist without ever seeing a value.
//!
//! ## Architecture
//!
//! ```text
//! CLI / library caller → SecretEngine → ReplicaSet → SecretBackend (Vault KV v2 | in-memory)
//!                          ↓
//!            resolver · lifecycle · auditor · reconciler · sweeper
//! ```
//!
//! ## Core Components
//!
//! - **Secret model** ([`secrets`]): paths, versions, metadata, the backend trait and replicas
//! - **Engine** ([`engine`]): create/update/delete/destroy, drift detection, resync, retention
//! - **Configuration** ([`config`]): explicit engine settings from TOML and environment
//! - **Observability** ([`observability`]): `tracing` spans and `metrics` counters
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use kvmirror::config::EngineConfig;
//! use kvmirror::engine::SecretEngine;
//!
//! #[tokio::main]
//! async fn main() -> kvmirror::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let engine = SecretEngine::connect(config).await?;
//!     let report = engine.check_sync("platform-a").await?;
//!     println!("{} drifted paths", report.drift.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::EngineConfig;
pub use engine::SecretEngine;
pub use errors::{Error, Result};
pub use secrets::{SecretBackend, SecretPath, SecretsError};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
