//! Player action surface.
//!
//! Actions the mod asks the game to perform on the player's behalf. The real
//! implementation lives in the page; [`MemoryPlayer`] records calls.

use crate::error::PlayerError;
use async_trait::async_trait;
use garden_mod_hooks::{ClientMessage, GameMessage, MemoryConnection};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Player tile position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One change of the crop inventory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CropInventoryDiff {
    /// Inventory after the change.
    pub inventory: Vec<Value>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl CropInventoryDiff {
    /// Diff two inventories by item `id`.
    pub fn between(before: &[Value], after: Vec<Value>) -> Self {
        let before_ids: HashSet<String> = before.iter().filter_map(item_id).collect();
        let after_ids: HashSet<String> = after.iter().filter_map(item_id).collect();
        let added = after.iter().filter_map(item_id).filter(|id| !before_ids.contains(id)).collect();
        let removed = before
            .iter()
            .filter_map(item_id)
            .filter(|id| !after_ids.contains(id))
            .collect();
        Self {
            inventory: after,
            added,
            removed,
        }
    }
}

/// Non-empty string `id` of an inventory item.
pub fn item_id(item: &Value) -> Option<String> {
    item.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
pub trait PlayerActions: Send + Sync {
    /// Send `SellAllCrops` through the game's own send call.
    async fn sell_all_crops(&self) -> Result<(), PlayerError>;
    async fn sell_all_pets(&self) -> Result<(), PlayerError>;

    async fn crop_inventory(&self) -> Result<Vec<Value>, PlayerError>;
    async fn favorite_ids(&self) -> Result<HashSet<String>, PlayerError>;
    /// Favorite (`on`) or unfavorite the given items.
    async fn ensure_favorites(&self, ids: &[String], on: bool) -> Result<(), PlayerError>;
    async fn subscribe_crop_inventory_diff(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<CropInventoryDiff>, PlayerError>;

    /// Discard one seed of `species`.
    async fn wish(&self, species: &str) -> Result<(), PlayerError>;

    async fn position(&self) -> Result<Option<Position>, PlayerError>;
    async fn move_to(&self, x: i64, y: i64) -> Result<(), PlayerError>;
}

/// A call recorded by [`MemoryPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    SellAllCrops,
    SellAllPets,
    EnsureFavorites { ids: Vec<String>, on: bool },
    Wish(String),
    MoveTo { x: i64, y: i64 },
}

/// In-process player.
///
/// With a connection, `sell_all_crops` goes through it the way the game's
/// own action does, so installed interceptors see it.
#[derive(Debug, Default)]
pub struct MemoryPlayer {
    connection: Option<Arc<MemoryConnection>>,
    crops: Mutex<Vec<Value>>,
    favorites: Mutex<BTreeSet<String>>,
    position: Mutex<Option<Position>>,
    calls: Mutex<Vec<PlayerCall>>,
    diff_subscribers: Mutex<Vec<mpsc::UnboundedSender<CropInventoryDiff>>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl MemoryPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(connection: Arc<MemoryConnection>) -> Self {
        Self {
            connection: Some(connection),
            ..Self::default()
        }
    }

    /// Replace the crop inventory and publish the diff.
    pub fn set_crop_inventory(&self, items: Vec<Value>) {
        let diff = {
            let mut crops = self.crops.lock();
            let diff = CropInventoryDiff::between(&crops, items.clone());
            *crops = items;
            diff
        };
        self.diff_subscribers
            .lock()
            .retain(|tx| tx.send(diff.clone()).is_ok());
    }

    pub fn favorites(&self) -> BTreeSet<String> {
        self.favorites.lock().clone()
    }

    pub fn set_favorites<I: IntoIterator<Item = String>>(&self, ids: I) {
        *self.favorites.lock() = ids.into_iter().collect();
    }

    pub fn set_position(&self, position: Option<Position>) {
        *self.position.lock() = position;
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().clone()
    }

    /// Make `action` (e.g. `"wish"`, `"ensure_favorites"`) fail.
    pub fn fail_action(&self, action: &'static str) {
        self.failing.lock().insert(action);
    }

    fn record(&self, action: &'static str, call: PlayerCall) -> Result<(), PlayerError> {
        self.calls.lock().push(call);
        if self.failing.lock().contains(action) {
            return Err(PlayerError::Failed {
                action,
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerActions for MemoryPlayer {
    async fn sell_all_crops(&self) -> Result<(), PlayerError> {
        self.record("sell_all_crops", PlayerCall::SellAllCrops)?;
        if let Some(connection) = &self.connection {
            connection.send(GameMessage::from(ClientMessage::SellAllCrops {}), &[]);
        }
        Ok(())
    }

    async fn sell_all_pets(&self) -> Result<(), PlayerError> {
        self.record("sell_all_pets", PlayerCall::SellAllPets)
    }

    async fn crop_inventory(&self) -> Result<Vec<Value>, PlayerError> {
        Ok(self.crops.lock().clone())
    }

    async fn favorite_ids(&self) -> Result<HashSet<String>, PlayerError> {
        Ok(self.favorites.lock().iter().cloned().collect())
    }

    async fn ensure_favorites(&self, ids: &[String], on: bool) -> Result<(), PlayerError> {
        self.record(
            "ensure_favorites",
            PlayerCall::EnsureFavorites {
                ids: ids.to_vec(),
                on,
            },
        )?;
        let mut favorites = self.favorites.lock();
        for id in ids {
            if on {
                favorites.insert(id.clone());
            } else {
                favorites.remove(id);
            }
        }
        Ok(())
    }

    async fn subscribe_crop_inventory_diff(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<CropInventoryDiff>, PlayerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.diff_subscribers.lock().push(tx);
        Ok(rx)
    }

    async fn wish(&self, species: &str) -> Result<(), PlayerError> {
        self.record("wish", PlayerCall::Wish(species.to_string()))
    }

    async fn position(&self) -> Result<Option<Position>, PlayerError> {
        Ok(*self.position.lock())
    }

    async fn move_to(&self, x: i64, y: i64) -> Result<(), PlayerError> {
        self.record("move_to", PlayerCall::MoveTo { x, y })?;
        *self.position.lock() = Some(Position {
            x: x as f64,
            y: y as f64,
        });
        Ok(())
    }
}
