//! Data model for versioned secrets and their mirrors.
//!
//! A logical secret lives at two physical locations inside the KV mount:
//! the primary path holding the real values and the mirror path
//! (`<mirror_prefix>/<path>`) holding the same keys with blank values.
//! Both trees share version numbering, so everything here is keyed by the
//! plain `u64` version the backend assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{Result, SecretsError};

/// Key/value payload of one secret version.
pub type SecretData = BTreeMap<String, String>;

/// Changes applied by an update: `Some(value)` upserts, `None` removes the key.
pub type SecretChanges = BTreeMap<String, Option<String>>;

/// Free-form custom metadata attached to a primary secret.
pub type CustomMetadata = BTreeMap<String, String>;

/// Logical secret path, relative to the KV mount (e.g. `platform-a/payments/db`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretPath(String);

impl SecretPath {
    /// Parse and normalise a logical path.
    ///
    /// Leading and trailing slashes are stripped. Empty segments and `..`
    /// are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(SecretsError::invalid_path(raw, "path cannot be empty"));
        }
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(SecretsError::invalid_path(raw, "path contains an empty segment"));
            }
            if segment == ".." || segment == "." {
                return Err(SecretsError::invalid_path(raw, "relative segments are not allowed"));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Join a scope and a relative name into one path.
    pub fn join(scope: &str, name: &str) -> Result<Self> {
        let scope = scope.trim_matches('/');
        if scope.is_empty() {
            Self::parse(name)
        } else {
            Self::parse(&format!("{}/{}", scope, name.trim_start_matches('/')))
        }
    }

    /// Physical location of the real secret.
    pub fn primary(&self) -> &str {
        &self.0
    }

    /// Physical location of the blank mirror.
    pub fn mirror(&self, mirror_prefix: &str) -> String {
        format!("{}/{}", mirror_prefix.trim_matches('/'), self.0)
    }

    /// Whether the path itself sits in the mirror tree.
    pub fn is_mirror(&self, mirror_prefix: &str) -> bool {
        let prefix = mirror_prefix.trim_matches('/');
        self.0 == prefix || self.0.starts_with(&format!("{}/", prefix))
    }

    /// Strip the mirror prefix if present, yielding the logical path.
    pub fn logical(&self, mirror_prefix: &str) -> SecretPath {
        let prefix = format!("{}/", mirror_prefix.trim_matches('/'));
        match self.0.strip_prefix(&prefix) {
            Some(rest) if !rest.is_empty() => SecretPath(rest.to_string()),
            _ => self.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deletion/destruction state of a single version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionState {
    /// When the version was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,

    /// Set when the version is soft-deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_time: Option<DateTime<Utc>>,

    /// Set when the version data is permanently gone.
    pub destroyed: bool,
}

impl VersionState {
    pub fn live(created_time: DateTime<Utc>) -> Self {
        Self { created_time: Some(created_time), deletion_time: None, destroyed: false }
    }

    /// Soft-deleted or destroyed.
    pub fn is_deleted(&self) -> bool {
        self.deletion_time.is_some() || self.destroyed
    }

    /// Readable by default.
    pub fn is_live(&self) -> bool {
        !self.is_deleted()
    }

    /// Whether two trees agree on this version's deletion state.
    ///
    /// A destroyed version counts as deleted: the mirror only needs to hide
    /// the version, it never holds data worth destroying.
    pub fn same_deletion_state(&self, other: &VersionState) -> bool {
        self.is_deleted() == other.is_deleted()
    }
}

/// Per-path metadata as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    /// Highest version ever written.
    pub current_version: u64,

    /// Lowest version still retained in history.
    pub oldest_version: u64,

    /// State of every retained version.
    pub versions: BTreeMap<u64, VersionState>,

    /// Custom metadata (owner/source/usage and scheduling keys).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_metadata: CustomMetadata,
}

impl SecretMetadata {
    pub fn version(&self, version: u64) -> Option<&VersionState> {
        self.versions.get(&version)
    }

    /// Whether `version` exists in the version history (deleted or not).
    pub fn has_version(&self, version: u64) -> bool {
        self.versions.contains_key(&version)
    }
}

/// One version of a secret, with its data when readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u64,

    /// Empty when the version is deleted or destroyed.
    pub data: SecretData,

    #[serde(flatten)]
    pub state: VersionState,
}

/// A string wrapper that redacts its contents in Debug, Display, and serialization.
///
/// Used for replica tokens loaded from configuration. Memory is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(SecretString(value))
    }
}

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
