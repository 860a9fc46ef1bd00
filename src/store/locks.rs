use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::collection::CollectionName;

/// Lazily created writer lock per collection name.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<CollectionName, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive write access to `name`. The returned guard is owned
    /// so it can move onto the blocking pool together with the write it protects.
    pub async fn acquire(&self, name: &CollectionName) -> OwnedMutexGuard<()> {
        let lock = {
            // Poisoning only means another thread panicked while inserting;
            // the map itself is still consistent.
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(name.clone()).or_default())
        };
        lock.lock_owned().await
    }
}
