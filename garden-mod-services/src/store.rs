//! Reactive store facade.
//!
//! The game keeps its state in named reactive cells. Everything here reads
//! them asynchronously and treats failures as "unknown".

use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::mpsc;

/// The store cells this crate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomKey {
    Garden,
    CropItemsToSell,
    Inventory,
    SeedInventory,
    SelectedItemName,
    TotalCropSellPrice,
    TotalPetSellPrice,
    CurrentGardenTile,
}

impl AtomKey {
    pub fn name(self) -> &'static str {
        match self {
            Self::Garden => "garden",
            Self::CropItemsToSell => "myCropItemsToSell",
            Self::Inventory => "myInventory",
            Self::SeedInventory => "mySeedInventory",
            Self::SelectedItemName => "mySelectedItemName",
            Self::TotalCropSellPrice => "totalCropSellPrice",
            Self::TotalPetSellPrice => "totalPetSellPrice",
            Self::CurrentGardenTile => "myCurrentGardenTile",
        }
    }
}

impl fmt::Display for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Change feed of one cell. Yields each new value; ends when the store drops it.
pub type AtomSubscription = mpsc::UnboundedReceiver<Value>;

/// Asynchronous access to the game's reactive cells.
#[async_trait]
pub trait AtomStore: Send + Sync {
    async fn get(&self, atom: AtomKey) -> Result<Value, StoreError>;
    async fn subscribe(&self, atom: AtomKey) -> Result<AtomSubscription, StoreError>;
}

/// Read a cell, logging and mapping failures to `Value::Null`.
pub async fn get_or_null(store: &dyn AtomStore, atom: AtomKey) -> Value {
    match store.get(atom).await {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Store read of {} failed: {}", atom, e);
            Value::Null
        }
    }
}

/// In-process store. Unset cells read as `null`.
#[derive(Debug, Default)]
pub struct MemoryAtomStore {
    values: Mutex<HashMap<AtomKey, Value>>,
    subscribers: Mutex<HashMap<AtomKey, Vec<mpsc::UnboundedSender<Value>>>>,
    unavailable: Mutex<HashSet<AtomKey>>,
}

impl MemoryAtomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell and notify its subscribers.
    pub fn set(&self, atom: AtomKey, value: Value) {
        self.values.lock().insert(atom, value.clone());
        if let Some(senders) = self.subscribers.lock().get_mut(&atom) {
            senders.retain(|tx| tx.send(value.clone()).is_ok());
        }
    }

    pub fn value(&self, atom: AtomKey) -> Value {
        self.values.lock().get(&atom).cloned().unwrap_or(Value::Null)
    }

    /// Make reads and subscriptions of `atom` fail.
    pub fn set_unavailable(&self, atom: AtomKey, unavailable: bool) {
        let mut set = self.unavailable.lock();
        if unavailable {
            set.insert(atom);
        } else {
            set.remove(&atom);
        }
    }

    /// Live subscriptions on `atom`.
    pub fn subscriber_count(&self, atom: AtomKey) -> usize {
        self.subscribers
            .lock()
            .get(&atom)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    fn check(&self, atom: AtomKey) -> Result<(), StoreError> {
        if self.unavailable.lock().contains(&atom) {
            Err(StoreError::Unavailable(atom))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AtomStore for MemoryAtomStore {
    async fn get(&self, atom: AtomKey) -> Result<Value, StoreError> {
        self.check(atom)?;
        Ok(self.value(atom))
    }

    async fn subscribe(&self, atom: AtomKey) -> Result<AtomSubscription, StoreError> {
        self.check(atom)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().entry(atom).or_default().push(tx);
        Ok(rx)
    }
}
