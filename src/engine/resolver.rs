//! Latest readable version of a path.
//!
//! This backward scan is the single answer to "what does a reader see by
//! default". Deleted and destroyed versions are skipped; a path with no
//! readable version resolves to `None`, never to an error.

use crate::secrets::{Result, SecretMetadata, SecretPath};

use super::SecretEngine;

/// Highest version between `current_version` and `oldest_version` (inclusive)
/// that is neither soft-deleted nor destroyed.
pub fn latest_live_version(metadata: &SecretMetadata) -> Option<u64> {
    (metadata.oldest_version..=metadata.current_version)
        .rev()
        .find(|v| metadata.version(*v).is_some_and(|state| state.is_live()))
}

impl SecretEngine {
    /// Latest readable version of the primary secret.
    ///
    /// Backend errors other than "not found" are surfaced.
    pub async fn get_latest_version(&self, path: &SecretPath) -> Result<Option<u64>> {
        self.latest_version_at(path.primary()).await
    }

    /// Same resolution against any physical location, mirror included.
    pub async fn latest_version_at(&self, physical_path: &str) -> Result<Option<u64>> {
        let metadata = self.replicas.read_metadata(physical_path).await?;
        Ok(metadata.as_ref().and_then(latest_live_version))
    }
}
