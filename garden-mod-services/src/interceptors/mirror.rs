//! Local mirror of the garden cells the interceptors read synchronously.

use crate::store::{AtomKey, AtomStore, AtomSubscription};
use garden_mod_hooks::spawn_detached;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct GardenMirror {
    garden: RwLock<Option<Value>>,
    crop_items_to_sell: RwLock<Option<Vec<Value>>>,
}

impl GardenMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` over the latest garden state.
    pub fn with_garden<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> R {
        f(self.garden.read().as_ref())
    }

    pub fn set_garden(&self, garden: Value) {
        *self.garden.write() = (!garden.is_null()).then_some(garden);
    }

    pub fn crop_items_to_sell(&self) -> Option<Vec<Value>> {
        self.crop_items_to_sell.read().clone()
    }

    pub fn set_crop_items_to_sell(&self, items: Value) {
        *self.crop_items_to_sell.write() = match items {
            Value::Array(items) => Some(items),
            _ => None,
        };
    }

    /// Load both cells and follow their changes until the store closes the feeds.
    pub fn spawn_sync(self: &Arc<Self>, store: Arc<dyn AtomStore>) -> Option<JoinHandle<()>> {
        let mirror = Arc::clone(self);
        spawn_detached("garden-mirror", async move {
            let mut garden = mirror.load(&*store, AtomKey::Garden).await;
            let mut crops = mirror.load(&*store, AtomKey::CropItemsToSell).await;
            loop {
                tokio::select! {
                    Some(next) = next_value(&mut garden) => mirror.set_garden(next),
                    Some(next) = next_value(&mut crops) => mirror.set_crop_items_to_sell(next),
                    else => break,
                }
            }
            Ok(())
        })
    }

    async fn load(&self, store: &dyn AtomStore, atom: AtomKey) -> Option<AtomSubscription> {
        match store.get(atom).await {
            Ok(value) => self.apply(atom, value),
            Err(e) => log::debug!("Mirror could not read {}: {}", atom, e),
        }
        match store.subscribe(atom).await {
            Ok(rx) => Some(rx),
            Err(e) => {
                log::warn!("Mirror could not follow {}: {}", atom, e);
                None
            }
        }
    }

    fn apply(&self, atom: AtomKey, value: Value) {
        match atom {
            AtomKey::Garden => self.set_garden(value),
            AtomKey::CropItemsToSell => self.set_crop_items_to_sell(value),
            _ => {}
        }
    }
}

async fn next_value(feed: &mut Option<AtomSubscription>) -> Option<Value> {
    match feed {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
