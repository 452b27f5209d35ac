//! Error types for secret lifecycle and mirror synchronization.

use thiserror::Error;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while driving the versioned KV backend.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Path or version absent in the backend.
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// Create invoked on a path that already has a readable version.
    #[error("Secret already exists: {path} (latest version {version})")]
    AlreadyExists { path: String, version: u64 },

    /// The mirror tree is not positioned where the next version can be appended.
    #[error(
        "Unexpected mirror version for '{path}': expected current version {expected}, found {actual}"
    )]
    VersionInvariantViolation { path: String, expected: u64, actual: u64 },

    /// A write to one of the configured replicas failed.
    #[error("Write to replica {replica} failed: {message}")]
    BackendWriteFailure { replica: String, message: String },

    /// The operator declined a confirmation prompt.
    #[error("Operation aborted: confirmation declined")]
    ConfirmationDeclined,

    /// A check-and-set write was rejected because the secret moved underneath us.
    #[error("Version conflict on '{path}': {message}")]
    Conflict { path: String, message: String },

    /// Secret value validation failed.
    #[error("Invalid secret value: {reason}")]
    InvalidValue { reason: String },

    /// Invalid secret path.
    #[error("Invalid secret path: {path} - {reason}")]
    InvalidPath { path: String, reason: String },

    /// Backend-specific error.
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SecretsError {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an already exists error.
    pub fn already_exists(path: impl Into<String>, version: u64) -> Self {
        Self::AlreadyExists { path: path.into(), version }
    }

    /// Create a mirror ordering violation.
    pub fn version_invariant(path: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::VersionInvariantViolation { path: path.into(), expected, actual }
    }

    /// Create a replica write failure.
    pub fn write_failure(replica: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendWriteFailure { replica: replica.into(), message: message.into() }
    }

    /// Create a check-and-set conflict.
    pub fn conflict(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict { path: path.into(), message: message.into() }
    }

    /// Create an invalid value error.
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue { reason: reason.into() }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into(), reason: reason.into() }
    }

    /// Create a backend error.
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }

    /// Whether this error means "absent" rather than "broken".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short machine-friendly label used for metrics and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::VersionInvariantViolation { .. } => "version_invariant_violation",
            Self::BackendWriteFailure { .. } => "backend_write_failure",
            Self::ConfirmationDeclined => "confirmation_declined",
            Self::Conflict { .. } => "conflict",
            Self::InvalidValue { .. } => "invalid_value",
            Self::InvalidPath { .. } => "invalid_path",
            Self::BackendError { .. } => "backend_error",
            Self::ConfigError { .. } => "config_error",
            Self::SerializationError(_) => "serialization_error",
        }
    }
}
