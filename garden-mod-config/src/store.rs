//! Key-value storage surface.
//!
//! Values are plain strings under flat, namespaced keys (`qws:keybind:gui.toggle`).
//! Local writes are not echoed to subscribers: subscribers only hear about
//! changes that originate elsewhere (another tab sharing the same storage, or
//! another process rewriting the backing file).

use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, channel};

/// A change made to the store by someone other than this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// The key that changed.
    pub key: String,
    /// The new value, or `None` if the key was removed.
    pub new_value: Option<String>,
}

/// Durable string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a key. `Ok(None)` means the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a key.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to external changes.
    ///
    /// Each call returns an independent receiver; drain it with `try_recv`
    /// from the owner's event loop.
    fn subscribe(&self) -> Receiver<StorageChange>;
}

/// Fan-out list of change subscribers.
///
/// Disconnected receivers are pruned on the next broadcast.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Mutex<Vec<Sender<StorageChange>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> Receiver<StorageChange> {
        let (tx, rx) = channel();
        self.senders.lock().push(tx);
        rx
    }

    pub(crate) fn broadcast(&self, change: &StorageChange) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

/// Process-local store backed by a `HashMap`.
///
/// Satisfies the storage surface for a single context. Use
/// [`MemoryStore::simulate_external_change`] to stand in for a write made by
/// another tab.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    subscribers: Subscribers,
    read_only: Mutex<bool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a change as if another tab had made it, and notify subscribers.
    pub fn simulate_external_change(&self, key: &str, value: Option<&str>) {
        {
            let mut values = self.values.lock();
            match value {
                Some(v) => {
                    values.insert(key.to_string(), v.to_string());
                }
                None => {
                    values.remove(key);
                }
            }
        }
        self.subscribers.broadcast(&StorageChange {
            key: key.to_string(),
            new_value: value.map(str::to_string),
        });
    }

    /// Make every subsequent write fail with [`StorageError::Unavailable`].
    ///
    /// Mirrors a browser with storage disabled or over quota.
    pub fn set_read_only(&self, read_only: bool) {
        *self.read_only.lock() = read_only;
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if *self.read_only.lock() {
            return Err(StorageError::Unavailable("store is read-only".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.values.lock().remove(key);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StorageChange> {
        self.subscribers.subscribe()
    }
}
