//! Garden state helpers: harvest targets, seed keys, crop size.

use crate::catalog::PlantCatalog;
use crate::locker::HarvestRequest;
use serde_json::Value;

const SEED_KEY_FIELDS: [&str; 6] = [
    "seedKey",
    "species",
    "seedSpecies",
    "plantSpecies",
    "cropSpecies",
    "speciesId",
];

const DIRECT_SIZE_FIELDS: [&str; 5] = ["sizePercent", "sizePct", "size", "percent", "progressPercent"];

const SCALE_FIELDS: [&str; 2] = ["targetScale", "scale"];

const MAX_SCALE_FIELDS: [&str; 6] = [
    "species",
    "seedSpecies",
    "plantSpecies",
    "cropSpecies",
    "baseSpecies",
    "seedKey",
];

/// Size assumed when a slot says nothing about growth.
pub const MATURE_SIZE_PERCENT: u8 = 100;

fn non_empty_str<'a>(object: &'a Value, field: &str) -> Option<&'a str> {
    object.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// First non-empty species-like string of a tile or slot.
pub fn extract_seed_key(object: &Value) -> Option<String> {
    if !object.is_object() {
        return None;
    }
    SEED_KEY_FIELDS
        .iter()
        .find_map(|field| non_empty_str(object, field))
        .map(str::to_string)
}

/// The first of `fields` that is present and not null.
fn first_present<'a>(object: &'a Value, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .find_map(|f| object.get(*f).filter(|v| !v.is_null()))
}

/// Loose numeric reading: numbers, numeric strings (blank is 0) and booleans.
fn loose_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        _ => f64::NAN,
    }
}

/// Rounds halves toward positive infinity.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn clamp_percent(value: f64, min: f64, max: f64) -> u8 {
    value.clamp(min, max) as u8
}

/// Maximum crop scale for a slot, from its species-like fields.
pub fn max_scale_for_slot(slot: &Value, catalog: &PlantCatalog) -> Option<f64> {
    if !slot.is_object() {
        return None;
    }
    let mut candidates: Vec<&str> = Vec::new();
    let seed_key = SEED_KEY_FIELDS
        .iter()
        .find_map(|field| non_empty_str(slot, field));
    let others = MAX_SCALE_FIELDS
        .iter()
        .filter_map(|field| non_empty_str(slot, field));
    for candidate in seed_key.into_iter().chain(others) {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
        .into_iter()
        .find_map(|c| catalog.max_scale(c))
}

/// Growth of a crop slot as a percentage in `0..=100`.
///
/// A direct percentage field wins. Otherwise the target (or current) scale
/// is mapped against the species' maximum scale: `(1, max]` maps linearly
/// onto `[50, 100]`. Without a known maximum, `(1, 2]` maps the same way and
/// anything else is `scale * 100`. No growth data at all means mature.
pub fn extract_size_percent(slot: &Value, catalog: &PlantCatalog) -> u8 {
    if !slot.is_object() {
        return MATURE_SIZE_PERCENT;
    }

    let direct = first_present(slot, &DIRECT_SIZE_FIELDS).map(loose_number);
    if let Some(direct) = direct.filter(|d| d.is_finite()) {
        return clamp_percent(round_half_up(direct), 0.0, 100.0);
    }

    let scale = first_present(slot, &SCALE_FIELDS).map(loose_number);
    let Some(scale) = scale.filter(|s| s.is_finite()) else {
        return MATURE_SIZE_PERCENT;
    };

    if let Some(max_scale) = max_scale_for_slot(slot, catalog).filter(|m| *m > 1.0) {
        let clamped = scale.clamp(1.0, max_scale);
        let pct = 50.0 + (clamped - 1.0) / (max_scale - 1.0) * 50.0;
        return clamp_percent(round_half_up(pct), 50.0, 100.0);
    }
    if scale > 1.0 && scale <= 2.0 {
        let pct = 50.0 + (scale - 1.0) * 50.0;
        return clamp_percent(round_half_up(pct), 50.0, 100.0);
    }
    clamp_percent(round_half_up(scale * 100.0), 0.0, 100.0)
}

/// Mutation names of a slot; non-strings are stringified, empties dropped.
pub fn sanitize_mutations(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// A plant tile and one of its crop slots.
#[derive(Debug, Clone, Copy)]
pub struct HarvestTarget<'a> {
    pub tile: &'a Value,
    pub crop_slot: &'a Value,
}

impl HarvestTarget<'_> {
    pub fn request(&self, catalog: &PlantCatalog) -> HarvestRequest {
        HarvestRequest {
            seed_key: extract_seed_key(self.tile),
            size_percent: extract_size_percent(self.crop_slot, catalog),
            mutations: sanitize_mutations(self.crop_slot.get("mutations")),
        }
    }
}

/// Resolve `tileObjects[slot].slots[slots_index]` in a garden state.
///
/// The tile must be a plant and the crop slot an object.
pub fn harvest_target(garden: &Value, slot: i64, slots_index: i64) -> Option<HarvestTarget<'_>> {
    let tile_objects = garden.get("tileObjects")?;
    let tile = match tile_objects {
        Value::Object(map) => map.get(&slot.to_string()),
        Value::Array(list) => usize::try_from(slot).ok().and_then(|i| list.get(i)),
        _ => None,
    }?;
    if !tile.is_object() || tile.get("objectType").and_then(Value::as_str) != Some("plant") {
        return None;
    }
    let index = usize::try_from(slots_index).ok()?;
    let crop_slot = tile.get("slots")?.as_array()?.get(index)?;
    crop_slot.is_object().then_some(HarvestTarget { tile, crop_slot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> PlantCatalog {
        PlantCatalog::from_value(json!({
            "Carrot": {"crop": {"maxScale": 2.0}},
            "Pumpkin": {"crop": {"maxScale": 3.0}}
        }))
    }

    #[test]
    fn test_seed_key_order() {
        assert_eq!(
            extract_seed_key(&json!({"species": "Carrot", "seedKey": "CarrotSeed"})).as_deref(),
            Some("CarrotSeed")
        );
        assert_eq!(
            extract_seed_key(&json!({"seedKey": "", "cropSpecies": "Tulip"})).as_deref(),
            Some("Tulip")
        );
        assert_eq!(extract_seed_key(&json!({"speciesId": 4})), None);
        assert_eq!(extract_seed_key(&json!("Carrot")), None);
    }

    #[test]
    fn test_target_scale_against_max() {
        let catalog = catalog();
        assert_eq!(extract_size_percent(&json!({"targetScale": 1.5, "species": "Carrot"}), &catalog), 75);
        assert_eq!(extract_size_percent(&json!({"targetScale": 2.0, "species": "Pumpkin"}), &catalog), 75);
        assert_eq!(extract_size_percent(&json!({"targetScale": 9.0, "species": "Pumpkin"}), &catalog), 100);
        assert_eq!(extract_size_percent(&json!({"targetScale": 0.2, "species": "Pumpkin"}), &catalog), 50);
    }

    #[test]
    fn test_scale_without_known_max() {
        let catalog = PlantCatalog::default();
        assert_eq!(extract_size_percent(&json!({"targetScale": 1.5}), &catalog), 75);
        assert_eq!(extract_size_percent(&json!({"scale": 0.42}), &catalog), 42);
        assert_eq!(extract_size_percent(&json!({"scale": 3.5}), &catalog), 100);
        assert_eq!(extract_size_percent(&json!({"scale": -1}), &catalog), 0);
    }

    #[test]
    fn test_direct_fields_win() {
        let catalog = catalog();
        assert_eq!(extract_size_percent(&json!({"sizePercent": 42.5, "targetScale": 2}), &catalog), 43);
        assert_eq!(extract_size_percent(&json!({"percent": "64"}), &catalog), 64);
        assert_eq!(extract_size_percent(&json!({"progressPercent": 250}), &catalog), 100);
        assert_eq!(extract_size_percent(&json!({"size": -3}), &catalog), 0);
    }

    #[test]
    fn test_missing_growth_is_mature() {
        let catalog = catalog();
        assert_eq!(extract_size_percent(&json!({}), &catalog), 100);
        assert_eq!(extract_size_percent(&json!({"size": "abc"}), &catalog), 100);
        assert_eq!(extract_size_percent(&json!(null), &catalog), 100);
    }

    #[test]
    fn test_size_percent_always_in_range() {
        let catalog = catalog();
        let samples = [
            json!(-1e12), json!(-0.5), json!(0), json!(0.999), json!(1), json!(1.0001),
            json!(1.5), json!(2), json!(2.5), json!(3), json!(1e9), json!("7"), json!(true),
        ];
        for field in ["sizePercent", "targetScale", "scale"] {
            for species in [None, Some("Carrot"), Some("Pumpkin")] {
                for value in &samples {
                    let mut slot = json!({ field: value });
                    if let Some(species) = species {
                        slot["species"] = json!(species);
                    }
                    let pct = extract_size_percent(&slot, &catalog);
                    assert!(pct <= 100, "{slot} -> {pct}");
                }
            }
        }
    }

    #[test]
    fn test_sanitize_mutations() {
        assert_eq!(
            sanitize_mutations(Some(&json!(["Gold", "", null, 3, "Wet"]))),
            vec!["Gold".to_string(), "3".to_string(), "Wet".to_string()]
        );
        assert!(sanitize_mutations(Some(&json!("Gold"))).is_empty());
        assert!(sanitize_mutations(None).is_empty());
    }

    #[test]
    fn test_harvest_target() {
        let garden = json!({
            "tileObjects": {
                "5": {"objectType": "plant", "species": "Carrot", "slots": [{"targetScale": 1.5}]},
                "6": {"objectType": "decor"}
            }
        });
        let target = harvest_target(&garden, 5, 0).unwrap();
        let request = target.request(&catalog());
        assert_eq!(request.seed_key.as_deref(), Some("Carrot"));
        assert_eq!(request.size_percent, 75);

        assert!(harvest_target(&garden, 5, 1).is_none());
        assert!(harvest_target(&garden, 5, -1).is_none());
        assert!(harvest_target(&garden, 6, 0).is_none());
        assert!(harvest_target(&garden, 7, 0).is_none());
        assert!(harvest_target(&json!(null), 5, 0).is_none());
    }
}
