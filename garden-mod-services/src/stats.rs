//! Named activity counters (harvests, purchases, hatches, ...).

use crate::pets::PetRarity;
use garden_mod_config::KeyValueStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage key of the persisted snapshot.
pub const STATS_STORAGE_KEY: &str = "qws:stats";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatGroup {
    Garden,
    Shop,
    Pets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default)]
    pub garden: BTreeMap<String, f64>,
    #[serde(default)]
    pub shop: BTreeMap<String, f64>,
    #[serde(default)]
    pub pets: BTreeMap<String, f64>,
}

impl StatsSnapshot {
    fn group(&self, group: StatGroup) -> &BTreeMap<String, f64> {
        match group {
            StatGroup::Garden => &self.garden,
            StatGroup::Shop => &self.shop,
            StatGroup::Pets => &self.pets,
        }
    }

    fn group_mut(&mut self, group: StatGroup) -> &mut BTreeMap<String, f64> {
        match group {
            StatGroup::Garden => &mut self.garden,
            StatGroup::Shop => &mut self.shop,
            StatGroup::Pets => &mut self.pets,
        }
    }

    /// Counter value, 0 if never incremented.
    pub fn get(&self, group: StatGroup, name: &str) -> f64 {
        self.group(group).get(name).copied().unwrap_or(0.0)
    }
}

/// Shared counter set, optionally written through to a store.
#[derive(Clone)]
pub struct StatsRecorder {
    stats: Arc<Mutex<StatsSnapshot>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder")
            .field("stats", &*self.stats.lock())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRecorder {
    /// In-memory counters.
    pub fn new() -> Self {
        Self {
            stats: Arc::new(Mutex::new(StatsSnapshot::default())),
            store: None,
        }
    }

    /// Counters loaded from and saved to `store` under [`STATS_STORAGE_KEY`].
    /// A missing or unreadable snapshot starts from zero.
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let loaded = match store.get(STATS_STORAGE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable stats snapshot: {}", e);
                StatsSnapshot::default()
            }),
            Ok(None) => StatsSnapshot::default(),
            Err(e) => {
                log::warn!("Failed to load stats: {}", e);
                StatsSnapshot::default()
            }
        };
        Self {
            stats: Arc::new(Mutex::new(loaded)),
            store: Some(store),
        }
    }

    /// Add `by` to a counter. Non-finite amounts are ignored.
    pub fn increment(&self, group: StatGroup, name: &str, by: f64) {
        if !by.is_finite() {
            log::debug!("Ignoring non-finite increment of {}", name);
            return;
        }
        let snapshot = {
            let mut stats = self.stats.lock();
            *stats.group_mut(group).entry(name.to_string()).or_insert(0.0) += by;
            self.store.is_some().then(|| stats.clone())
        };
        if let Some(snapshot) = snapshot {
            self.persist(&snapshot);
        }
    }

    pub fn increment_garden(&self, name: &str, by: f64) {
        self.increment(StatGroup::Garden, name, by);
    }

    pub fn increment_shop(&self, name: &str, by: f64) {
        self.increment(StatGroup::Shop, name, by);
    }

    /// Counts one hatch under `hatched.<species>.<rarity>`.
    pub fn increment_pet_hatched(&self, species: &str, rarity: PetRarity) {
        self.increment(StatGroup::Pets, &format!("hatched.{species}.{rarity}"), 1.0);
    }

    pub fn get(&self, group: StatGroup, name: &str) -> f64 {
        self.stats.lock().get(group, name)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.lock().clone()
    }

    pub fn reset(&self) {
        let snapshot = {
            let mut stats = self.stats.lock();
            *stats = StatsSnapshot::default();
            stats.clone()
        };
        if self.store.is_some() {
            self.persist(&snapshot);
        }
    }

    fn persist(&self, snapshot: &StatsSnapshot) {
        let Some(store) = &self.store else {
            return;
        };
        match serde_json::to_string(snapshot) {
            Ok(json) => {
                if let Err(e) = store.set(STATS_STORAGE_KEY, &json) {
                    log::warn!("Failed to persist stats: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to encode stats: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_mod_config::MemoryStore;

    #[test]
    fn test_increment_and_get() {
        let stats = StatsRecorder::new();
        stats.increment_garden("watercanUsed", 1.0);
        stats.increment_garden("watercanUsed", 1.0);
        stats.increment_shop("cropsSoldValue", 1250.5);
        stats.increment_shop("cropsSoldValue", f64::NAN);
        assert_eq!(stats.get(StatGroup::Garden, "watercanUsed"), 2.0);
        assert_eq!(stats.get(StatGroup::Shop, "cropsSoldValue"), 1250.5);
        assert_eq!(stats.get(StatGroup::Shop, "missing"), 0.0);
    }

    #[test]
    fn test_pet_hatch_counter_name() {
        let stats = StatsRecorder::new();
        stats.increment_pet_hatched("Bunny", PetRarity::Gold);
        assert_eq!(stats.get(StatGroup::Pets, "hatched.Bunny.gold"), 1.0);
    }

    #[test]
    fn test_persisted_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let stats = StatsRecorder::with_store(store.clone());
        stats.increment_garden("totalPlanted", 3.0);

        let reloaded = StatsRecorder::with_store(store);
        assert_eq!(reloaded.get(StatGroup::Garden, "totalPlanted"), 3.0);
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(STATS_STORAGE_KEY, "not json").unwrap();
        let stats = StatsRecorder::with_store(store);
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_read_only_store_keeps_counting() {
        let store = Arc::new(MemoryStore::new());
        store.set_read_only(true);
        let stats = StatsRecorder::with_store(store);
        stats.increment_shop("eggsBought", 1.0);
        assert_eq!(stats.get(StatGroup::Shop, "eggsBought"), 1.0);
    }
}
