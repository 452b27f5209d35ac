//! # Structured Logging
//!
//! Subscriber initialisation and span macros for engine operations.
//! Spans and events carry paths, versions and replica addresses; secret
//! values never appear in them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unsupported log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// Create a tracing span for a single-path secret operation.
///
/// ```rust,ignore
/// let span = secret_span!("update", path.as_str());
/// let span = secret_span!("resync", path.as_str(), version = 3);
/// ```
#[macro_export]
macro_rules! secret_span {
    ($operation:expr, $path:expr) => {
        tracing::info_span!(
            "secret_operation",
            operation = %$operation,
            path = %$path,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "secret_operation",
            operation = %$operation,
            path = %$path,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for a tree-wide scan (audit, sweep).
#[macro_export]
macro_rules! sweep_span {
    ($operation:expr, $scope:expr) => {
        tracing::info_span!(
            "tree_scan",
            operation = %$operation,
            scope = %$scope,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $scope:expr, $($field:tt)*) => {
        tracing::info_span!(
            "tree_scan",
            operation = %$operation,
            scope = %$scope,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug over info.
/// Installing twice (e.g. from tests) is not an error.
pub fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    // Subscriber already set elsewhere (e.g. integration tests); ignore.
    let _ = result;
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::EngineConfig) {
    let replicas: Vec<&str> = config.replicas.iter().map(|r| r.address.as_str()).collect();
    tracing::info!(
        backend = %config.backend,
        mount_path = %config.mount_path,
        platform = %config.platform,
        mirror_prefix = %config.mirror_prefix,
        replicas = ?replicas,
        "kvmirror engine configuration"
    );
}
