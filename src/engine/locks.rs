//! Per-path advisory locks.
//!
//! Lifecycle mutations and resync hold the lock for their read-modify-write
//! window so two writers in the same process never race on one path. Other
//! processes are caught by the backend's check-and-set guard instead.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive access to one path. Drops its map entry once nobody else waits.
#[derive(Debug)]
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // The map holds the only reference when no task holds or awaits the lock.
        self.locks.locks.remove_if(&self.path, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[derive(Debug, Default)]
pub struct PathLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`. Released when the guard drops.
    pub async fn lock(&self, path: &str) -> PathGuard<'_> {
        let mutex = self.locks.entry(path.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        PathGuard { locks: self, path: path.to_string(), guard: Some(guard) }
    }

    /// Number of paths currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
