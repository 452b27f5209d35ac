//! Blank mirror payloads and ordered mirror writes.

use tracing::debug;

use crate::secrets::{Result, SecretData, SecretPath, SecretsError};

use super::SecretEngine;

/// Same keys as `primary`, every value blank.
pub fn derive_mirror(primary: &SecretData) -> SecretData {
    primary.keys().map(|key| (key.clone(), String::new())).collect()
}

impl SecretEngine {
    /// Append version `target_version` to the mirror of `path`, derived from `primary`.
    ///
    /// The mirror must currently stand at `target_version - 1`; anything else
    /// would leave a gap or overwrite history, and is reported as
    /// [`SecretsError::VersionInvariantViolation`].
    /// Fail unless the mirror of `path` currently stands at `expected`.
    pub(crate) async fn ensure_mirror_at(&self, path: &SecretPath, expected: u64) -> Result<()> {
        let mirror_path = self.mirror_path(path);
        let current = self
            .replicas
            .read_metadata(&mirror_path)
            .await?
            .map(|m| m.current_version)
            .unwrap_or(0);
        if current != expected {
            return Err(SecretsError::version_invariant(mirror_path, expected, current));
        }
        Ok(())
    }

    pub(crate) async fn write_mirror_version(
        &self,
        path: &SecretPath,
        target_version: u64,
        primary: &SecretData,
    ) -> Result<u64> {
        let mirror_path = self.mirror_path(path);
        let current = self
            .replicas
            .read_metadata(&mirror_path)
            .await?
            .map(|m| m.current_version)
            .unwrap_or(0);

        let expected = target_version.saturating_sub(1);
        if current != expected {
            return Err(SecretsError::version_invariant(mirror_path, expected, current));
        }

        let written = self
            .replicas
            .write_version(&mirror_path, &derive_mirror(primary), Some(current))
            .await?;
        if written != target_version {
            return Err(SecretsError::version_invariant(mirror_path, target_version, written));
        }

        debug!(path = %mirror_path, version = written, keys = primary.len(), "Wrote mirror version");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_mirror_blanks_values() {
        let primary: SecretData =
            [("user".to_string(), "admin".to_string()), ("pass".to_string(), "hunter2".to_string())]
                .into_iter()
                .collect();
        let mirror = derive_mirror(&primary);
        assert_eq!(mirror.len(), 2);
        assert!(mirror.values().all(String::is_empty));
        assert!(mirror.keys().eq(primary.keys()));
    }

    #[test]
    fn test_derive_mirror_of_empty_payload() {
        assert!(derive_mirror(&SecretData::new()).is_empty());
    }

    proptest! {
        #[test]
        fn prop_mirror_keeps_key_set(data in prop::collection::btree_map("[a-z_]{1,12}", ".{1,24}", 0..16)) {
            let mirror = derive_mirror(&data);
            prop_assert!(mirror.keys().eq(data.keys()));
            prop_assert!(mirror.values().all(|v| v.is_empty()));
        }
    }
}
