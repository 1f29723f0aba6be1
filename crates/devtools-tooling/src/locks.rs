//! Per-path exclusion for file mutations.
//!
//! Two format calls on the same file would otherwise race on the single
//! `.bak` slot. Calls on different paths never contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

type Slot = Arc<Mutex<()>>;

/// Hands out one async lock per path, created on demand.
#[derive(Debug, Default)]
pub struct PathLocks {
    slots: SyncMutex<HashMap<PathBuf, Slot>>,
}

impl PathLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until no other guard for `path` is alive.
    pub async fn lock(self: &Arc<Self>, path: &Path) -> PathLockGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(path.to_path_buf()).or_default())
        };

        trace!("Waiting for mutation lock on {path:?}");
        let guard = slot.lock_owned().await;
        trace!("Acquired mutation lock on {path:?}");

        PathLockGuard {
            manager: Arc::clone(self),
            path: path.to_path_buf(),
            guard,
        }
    }

    /// Number of paths with a live slot.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no path currently has a slot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RAII guard for one path - released on drop
#[derive(Debug)]
pub struct PathLockGuard {
    manager: Arc<PathLocks>,
    path: PathBuf,
    guard: OwnedMutexGuard<()>,
}

impl PathLockGuard {
    /// Path this guard protects.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLockGuard {
    fn drop(&mut self) {
        let mut slots = self
            .manager
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // The map and this guard are the only owners: nobody is queued.
        if Arc::strong_count(OwnedMutexGuard::mutex(&self.guard)) == 2 {
            slots.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::spawn;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_same_path_is_serialized() {
        let locks = PathLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(spawn(async move {
                let _guard = locks.lock(Path::new("/work/app.ts")).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_paths_do_not_contend() {
        let locks = PathLocks::new();
        let first = locks.lock(Path::new("/work/a.py")).await;

        let second = timeout(Duration::from_secs(1), locks.lock(Path::new("/work/b.py")))
            .await
            .unwrap();

        assert_eq!(first.path(), Path::new("/work/a.py"));
        assert_eq!(second.path(), Path::new("/work/b.py"));
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_held_lock_blocks_second_caller() {
        let locks = PathLocks::new();
        let held = locks.lock(Path::new("/work/a.py")).await;

        let blocked = timeout(Duration::from_millis(50), locks.lock(Path::new("/work/a.py"))).await;
        assert!(blocked.is_err());

        drop(held);
        let reacquired = timeout(Duration::from_secs(1), locks.lock(Path::new("/work/a.py"))).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_slot_removed_after_release() {
        let locks = PathLocks::new();
        {
            let _guard = locks.lock(Path::new("/work/a.py")).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
