//! Plant catalog: species, display names and growth limits.

use garden_mod_config::normalize_species_key;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedPart {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CropPart {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "maxScale")]
    pub max_scale: Option<f64>,
}

/// One species entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlantEntry {
    #[serde(default)]
    pub seed: Option<NamedPart>,
    #[serde(default)]
    pub plant: Option<NamedPart>,
    #[serde(default)]
    pub crop: Option<CropPart>,
}

impl PlantEntry {
    fn max_scale(&self) -> Option<f64> {
        self.crop
            .as_ref()
            .and_then(|c| c.max_scale)
            .filter(|s| s.is_finite() && *s > 0.0)
    }
}

/// Species keyed catalog with a normalized-name index of maximum crop scale.
#[derive(Debug, Clone, Default)]
pub struct PlantCatalog {
    entries: BTreeMap<String, PlantEntry>,
    max_scale_by_name: HashMap<String, f64>,
}

impl PlantCatalog {
    /// Build from a `{ species: { seed, plant, crop } }` object.
    /// Malformed entries are skipped.
    pub fn from_value(value: Value) -> Self {
        let mut entries = BTreeMap::new();
        if let Value::Object(map) = value {
            for (species, raw) in map {
                match serde_json::from_value::<PlantEntry>(raw) {
                    Ok(entry) => {
                        entries.insert(species, entry);
                    }
                    Err(e) => log::warn!("Skipping catalog entry {}: {}", species, e),
                }
            }
        }
        Self::from_entries(entries)
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        anyhow::ensure!(value.is_object(), "plant catalog must be a JSON object");
        Ok(Self::from_value(value))
    }

    pub fn from_entries(entries: BTreeMap<String, PlantEntry>) -> Self {
        let mut max_scale_by_name = HashMap::new();
        for (species, entry) in &entries {
            let Some(max_scale) = entry.max_scale() else {
                continue;
            };
            let names = [
                Some(species.as_str()),
                entry.seed.as_ref().and_then(|p| p.name.as_deref()),
                entry.plant.as_ref().and_then(|p| p.name.as_deref()),
                entry.crop.as_ref().and_then(|p| p.name.as_deref()),
            ];
            for name in names.into_iter().flatten() {
                let key = normalize_species_key(name.trim());
                if !key.is_empty() {
                    max_scale_by_name.entry(key).or_insert(max_scale);
                }
            }
        }
        Self {
            entries,
            max_scale_by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, species: &str) -> bool {
        self.entries.contains_key(species)
    }

    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Maximum crop scale for a species, seed, plant or crop name.
    pub fn max_scale(&self, name: &str) -> Option<f64> {
        let key = normalize_species_key(name.trim());
        if key.is_empty() {
            return None;
        }
        self.max_scale_by_name.get(&key).copied()
    }

    /// Seed display name, `"<species> Seed"` if the catalog has none.
    pub fn seed_name(&self, species: &str) -> String {
        self.entries
            .get(species)
            .and_then(|e| e.seed.as_ref())
            .and_then(|s| s.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{species} Seed"))
    }

    /// Species whose seed is displayed as `display_name`.
    pub fn species_for_seed_name(&self, display_name: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|species| self.seed_name(species) == display_name)
            .cloned()
            .collect()
    }
}
