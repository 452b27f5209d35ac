//! # Configuration Management
//!
//! Engine configuration is loaded once (TOML file plus environment
//! overrides) and passed explicitly to every operation.

pub mod settings;

pub use settings::{
    EngineConfig, ReplicaConfig, DEFAULT_DESTROY_AFTER_KEY, DEFAULT_DESTROY_GRACE_DAYS,
    DEFAULT_MIRROR_PREFIX, DEFAULT_MOUNT_PATH, DEFAULT_REQUIRED_METADATA,
};
