//! JSON file backed [`KeyValueStore`].
//!
//! The whole store is a single flat JSON object of string values. Every write
//! rewrites the file atomically (temp file + rename). With the `watcher`
//! feature, external rewrites are detected, reloaded and diffed; every key
//! whose value differs is reported to subscribers as a [`StorageChange`].

use crate::error::StorageError;
use crate::store::{KeyValueStore, StorageChange, Subscribers};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

const STORE_FILE_NAME: &str = "storage.json";

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    subscribers: Subscribers,
}

impl Inner {
    fn read_file(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Re-read the file and broadcast every key that differs from memory.
    fn reload(&self) -> Result<usize, StorageError> {
        let on_disk = Self::read_file(&self.path)?;
        let changes: Vec<StorageChange> = {
            let mut values = self.values.lock();
            let mut changes = Vec::new();
            for (key, value) in &on_disk {
                if values.get(key) != Some(value) {
                    changes.push(StorageChange {
                        key: key.clone(),
                        new_value: Some(value.clone()),
                    });
                }
            }
            for key in values.keys() {
                if !on_disk.contains_key(key) {
                    changes.push(StorageChange {
                        key: key.clone(),
                        new_value: None,
                    });
                }
            }
            *values = on_disk;
            changes
        };

        for change in &changes {
            log::debug!("Storage key changed externally: {}", change.key);
            self.subscribers.broadcast(change);
        }
        Ok(changes.len())
    }
}

/// Persistent store in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    inner: Arc<Inner>,
    #[cfg(feature = "watcher")]
    watcher: Arc<Mutex<Option<crate::watcher::StoreWatcher>>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A file that exists but cannot be parsed is logged and treated as empty;
    /// the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Inner::read_file(&path) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("Ignoring unreadable storage file {:?}: {}", path, e);
                BTreeMap::new()
            }
        };
        log::info!("Storage path: {:?} ({} keys)", path, values.len());
        Self {
            inner: Arc::new(Inner {
                path,
                values: Mutex::new(values),
                subscribers: Subscribers::default(),
            }),
            #[cfg(feature = "watcher")]
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the store at the platform default location
    /// (`<config dir>/garden-mod/storage.json`).
    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    /// Platform default storage path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("garden-mod")
            .join(STORE_FILE_NAME)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Re-read the backing file, notifying subscribers of every changed key.
    ///
    /// Returns how many keys changed.
    pub fn reload(&self) -> Result<usize, StorageError> {
        self.inner.reload()
    }

    /// Start watching the backing file for external rewrites.
    ///
    /// The file is created first if needed. Calling this twice replaces the
    /// previous watcher.
    #[cfg(feature = "watcher")]
    pub fn start_watching(&self, debounce_delay_ms: u64) -> anyhow::Result<()> {
        if !self.inner.path.exists() {
            let snapshot = self.inner.values.lock().clone();
            self.inner.persist(&snapshot)?;
        }
        let inner = Arc::clone(&self.inner);
        let watcher =
            crate::watcher::StoreWatcher::new(&self.inner.path, debounce_delay_ms, move || {
                if let Err(e) = inner.reload() {
                    log::warn!("Failed to reload storage after external change: {}", e);
                }
            })?;
        *self.watcher.lock() = Some(watcher);
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.inner.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.inner.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.inner.values.lock();
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.inner.persist(&values)
    }

    fn subscribe(&self) -> Receiver<StorageChange> {
        self.inner.subscribers.subscribe()
    }
}
