use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};

use crate::ChunkIndices;

/// Per-chunk reader-writer locks.
///
/// Locks are created on first use and shared between all users of the same chunk.
/// A writer performing a read-modify-write holds the chunk's write lock for the whole cycle.
#[derive(Debug, Default)]
pub struct ChunkLocks {
    locks: Mutex<HashMap<ChunkIndices, Arc<RwLock<()>>>>,
}

impl ChunkLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for the chunk at `chunk_indices`.
    #[must_use]
    pub fn get(&self, chunk_indices: &[u64]) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(chunk_indices.to_vec())
            .or_insert_with(|| Arc::new(RwLock::default()))
            .clone()
    }

    /// Drop locks which are not held by anyone.
    pub fn prune(&self) {
        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_locks_shared() {
        let locks = ChunkLocks::new();
        let a = locks.get(&[0, 1]);
        let b = locks.get(&[0, 1]);
        assert!(Arc::ptr_eq(&a, &b));
        let c = locks.get(&[1, 0]);
        assert!(!Arc::ptr_eq(&a, &c));

        let guard = a.write();
        assert!(b.try_read().is_none());
        assert!(c.try_write().is_some());
        drop(guard);
        assert!(b.try_read().is_some());
    }

    #[test]
    fn chunk_locks_prune() {
        let locks = ChunkLocks::new();
        let held = locks.get(&[0]);
        let _ = locks.get(&[1]);
        locks.prune();
        assert_eq!(locks.locks.lock().len(), 1);
        drop(held);
        locks.prune();
        assert!(locks.locks.lock().is_empty());
    }
}
