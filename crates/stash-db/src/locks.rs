//! Per-record reader/writer locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// A registry of `RwLock`s keyed by record id.
///
/// Entries are held weakly, so a lock lives exactly as long as some task holds
/// or waits on it. Dead entries are pruned whenever a new lock is created.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Weak<RwLock<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<RwLock<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = entries.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        entries.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(RwLock::new(()));
        entries.insert(key.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Shared access to `key`.
    pub async fn read(&self, key: &str) -> OwnedRwLockReadGuard<()> {
        self.lock_for(key).read_owned().await
    }

    /// Exclusive access to `key`.
    pub async fn write(&self, key: &str) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(key).write_owned().await
    }

    /// Number of keys with a live lock.
    pub fn active(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }
}
