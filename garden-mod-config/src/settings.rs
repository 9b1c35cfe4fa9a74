//! Typed mod settings over a [`KeyValueStore`].
//!
//! Every read fails soft to the caller's default and every write swallows
//! storage errors after logging them.

use crate::species::normalize_species_key;
use crate::store::KeyValueStore;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const BLOCK_SELL_CROPS_KEY: &str = "qws:sell:blockCrops";
pub const PET_FOOD_TOGGLE_KEY: &str = "qws:alerts:petFood";
pub const PET_FOOD_SPECIES_KEY: &str = "qws:alerts:petFood:species";
pub const GHOST_ENABLED_KEY: &str = "qws:player:ghostMode";
pub const GHOST_DELAY_KEY: &str = "qws:ghost:delayMs";

/// Default delay between ghost movement steps.
pub const DEFAULT_GHOST_DELAY_MS: u64 = 50;
/// Smallest accepted ghost step delay.
pub const MIN_GHOST_DELAY_MS: u64 = 5;

/// Mod settings accessor.
#[derive(Clone)]
pub struct ModSettings {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for ModSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModSettings").finish_non_exhaustive()
    }
}

impl ModSettings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to read setting {}: {}", key, e);
                None
            }
        }
    }

    fn write_raw(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            log::warn!("Failed to persist setting {}: {}", key, e);
        }
    }

    fn read_flag(&self, key: &str, default: bool) -> bool {
        self.read_raw(key).map(|v| v == "1").unwrap_or(default)
    }

    fn write_flag(&self, key: &str, on: bool) {
        self.write_raw(key, if on { "1" } else { "0" });
    }

    /// Whether "sell all crops" is blocked outright.
    pub fn block_sell_crops(&self, default: bool) -> bool {
        self.read_flag(BLOCK_SELL_CROPS_KEY, default)
    }

    pub fn set_block_sell_crops(&self, on: bool) {
        self.write_flag(BLOCK_SELL_CROPS_KEY, on);
    }

    /// Whether crops of protected (pet-food) species are auto-favorited.
    pub fn pet_food_toggle(&self, default: bool) -> bool {
        self.read_flag(PET_FOOD_TOGGLE_KEY, default)
    }

    pub fn set_pet_food_toggle(&self, on: bool) {
        self.write_flag(PET_FOOD_TOGGLE_KEY, on);
    }

    /// Normalized keys of the species protected from "sell all".
    pub fn pet_food_species(&self) -> BTreeSet<String> {
        let Some(raw) = self.read_raw(PET_FOOD_SPECIES_KEY) else {
            return BTreeSet::new();
        };
        match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(values) => values
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => normalize_species_key(s),
                    other => normalize_species_key(&other.to_string()),
                })
                .collect(),
            Err(e) => {
                log::warn!("Ignoring malformed pet-food species list: {}", e);
                BTreeSet::new()
            }
        }
    }

    pub fn set_pet_food_species<I, S>(&self, species: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: Vec<String> = species
            .into_iter()
            .map(|s| normalize_species_key(s.as_ref()))
            .collect();
        match serde_json::to_string(&normalized) {
            Ok(json) => self.write_raw(PET_FOOD_SPECIES_KEY, &json),
            Err(e) => log::warn!("Failed to encode pet-food species list: {}", e),
        }
    }

    pub fn is_pet_food_species(&self, species: &str) -> bool {
        self.pet_food_species()
            .contains(&normalize_species_key(species))
    }

    pub fn set_pet_food_for_species(&self, species: &str, on: bool) {
        let mut set = self.pet_food_species();
        let key = normalize_species_key(species);
        if on {
            set.insert(key);
        } else {
            set.remove(&key);
        }
        self.set_pet_food_species(set);
    }

    pub fn ghost_enabled(&self, default: bool) -> bool {
        self.read_flag(GHOST_ENABLED_KEY, default)
    }

    pub fn set_ghost_enabled(&self, on: bool) {
        self.write_flag(GHOST_ENABLED_KEY, on);
    }

    /// Delay between ghost movement steps, never below [`MIN_GHOST_DELAY_MS`].
    pub fn ghost_delay_ms(&self) -> u64 {
        let parsed = self
            .read_raw(GHOST_DELAY_KEY)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite() && *n > 0.0)
            .map(|n| n.floor() as u64)
            .unwrap_or(DEFAULT_GHOST_DELAY_MS);
        parsed.max(MIN_GHOST_DELAY_MS)
    }

    /// Persist a step delay, clamped to [`MIN_GHOST_DELAY_MS`]. Returns the stored value.
    pub fn set_ghost_delay_ms(&self, delay_ms: u64) -> u64 {
        let value = if delay_ms == 0 {
            DEFAULT_GHOST_DELAY_MS
        } else {
            delay_ms.max(MIN_GHOST_DELAY_MS)
        };
        self.write_raw(GHOST_DELAY_KEY, &value.to_string());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn settings() -> (ModSettings, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ModSettings::new(store.clone()), store)
    }

    #[test]
    fn test_flags_default_when_missing() {
        let (settings, _) = settings();
        assert!(!settings.block_sell_crops(false));
        assert!(settings.block_sell_crops(true));
    }

    #[test]
    fn test_flag_round_trip() {
        let (settings, store) = settings();
        settings.set_block_sell_crops(true);
        assert_eq!(store.get(BLOCK_SELL_CROPS_KEY).unwrap().as_deref(), Some("1"));
        assert!(settings.block_sell_crops(false));
    }

    #[test]
    fn test_pet_food_species_are_normalized() {
        let (settings, _) = settings();
        settings.set_pet_food_species(["Daffodil Seed", "Moon-Celestial"]);
        let set = settings.pet_food_species();
        assert!(set.contains("daffodil"));
        assert!(set.contains("mooncelestial"));
        assert!(settings.is_pet_food_species("daffodil"));
    }

    #[test]
    fn test_pet_food_species_toggle() {
        let (settings, _) = settings();
        settings.set_pet_food_for_species("Carrot", true);
        assert!(settings.is_pet_food_species("carrot"));
        settings.set_pet_food_for_species("Carrot", false);
        assert!(!settings.is_pet_food_species("carrot"));
    }

    #[test]
    fn test_malformed_species_list_is_empty() {
        let (settings, store) = settings();
        store.set(PET_FOOD_SPECIES_KEY, "{oops").unwrap();
        assert!(settings.pet_food_species().is_empty());
    }

    #[test]
    fn test_ghost_delay_clamped() {
        let (settings, store) = settings();
        assert_eq!(settings.ghost_delay_ms(), DEFAULT_GHOST_DELAY_MS);
        assert_eq!(settings.set_ghost_delay_ms(2), MIN_GHOST_DELAY_MS);
        assert_eq!(settings.ghost_delay_ms(), MIN_GHOST_DELAY_MS);
        store.set(GHOST_DELAY_KEY, "abc").unwrap();
        assert_eq!(settings.ghost_delay_ms(), DEFAULT_GHOST_DELAY_MS);
    }

    #[test]
    fn test_failed_write_is_swallowed() {
        let (settings, store) = settings();
        store.set_read_only(true);
        settings.set_block_sell_crops(true);
        assert!(!settings.block_sell_crops(false));
    }
}
