//! Per-key mutual exclusion for read-modify-write sequences.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    /// Holders plus waiters, including waiters that are later cancelled.
    users: usize,
}

/// Hands out one async lock per key.
///
/// Locks are created on demand and dropped once nobody holds or waits on
/// them, so the table only ever contains keys with requests in flight.
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Counts one user of a slot; unregisters on drop, whether the lock was
/// acquired or the wait was cancelled.
struct Registration<'a> {
    owner: &'a KeyLocks,
    key: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.slots.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

/// Guard returned by [`KeyLocks::lock`]. Releases the key when dropped.
pub struct KeyGuard<'a> {
    // Field order matters: the mutex is released before unregistering.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and take it.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let lock = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                lock: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            slot.lock.clone()
        };
        let registration = Registration {
            owner: self,
            key: key.to_string(),
        };

        let guard = lock.lock_owned().await;
        KeyGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
