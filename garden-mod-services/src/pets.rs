//! Pet snapshots read out of the player's inventory.

use crate::garden::sanitize_mutations;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// A pet as seen in one inventory read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryPetSnapshot {
    pub id: String,
    pub species: String,
    pub mutations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PetRarity {
    Normal,
    Gold,
    Rainbow,
}

impl PetRarity {
    /// Rainbow beats gold, gold (or golden) beats normal.
    pub fn from_mutations(mutations: &[String]) -> Self {
        let has = |name: &str| mutations.iter().any(|m| m.eq_ignore_ascii_case(name));
        if has("rainbow") {
            Self::Rainbow
        } else if has("gold") || has("golden") {
            Self::Gold
        } else {
            Self::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Gold => "gold",
            Self::Rainbow => "rainbow",
        }
    }
}

impl fmt::Display for PetRarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item list of an inventory value: a bare array, `{items}`, `{inventory}`
/// or `{inventory: {items}}`.
fn inventory_items(inventory: &Value) -> &[Value] {
    let candidates = [
        Some(inventory),
        inventory.get("items"),
        inventory.get("inventory"),
        inventory.get("inventory").and_then(|i| i.get("items")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// A field on the item itself or under its `data`.
fn pet_field<'a>(source: &'a Value, field: &str) -> Option<&'a Value> {
    source
        .get(field)
        .filter(|v| !v.is_null())
        .or_else(|| source.get("data").and_then(|d| d.get(field)))
        .filter(|v| !v.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn to_pet(entry: &Value) -> Option<InventoryPetSnapshot> {
    let source = entry.get("item").filter(|i| i.is_object()).unwrap_or(entry);
    if !source.is_object() {
        return None;
    }
    let item_type = pet_field(source, "itemType").and_then(Value::as_str)?;
    if !item_type.eq_ignore_ascii_case("pet") {
        return None;
    }
    Some(InventoryPetSnapshot {
        id: pet_field(source, "id").and_then(as_text)?,
        species: pet_field(source, "petSpecies").and_then(as_text)?,
        mutations: sanitize_mutations(pet_field(source, "mutations")),
    })
}

/// Every pet in an inventory value.
pub fn collect_inventory_pets(inventory: &Value) -> Vec<InventoryPetSnapshot> {
    inventory_items(inventory).iter().filter_map(to_pet).collect()
}

pub fn pet_ids(pets: &[InventoryPetSnapshot]) -> HashSet<String> {
    pets.iter().map(|p| p.id.clone()).collect()
}

/// Pets whose id is not in `previous`.
pub fn new_pets(
    pets: Vec<InventoryPetSnapshot>,
    previous: &HashSet<String>,
) -> Vec<InventoryPetSnapshot> {
    pets.into_iter()
        .filter(|p| !previous.contains(&p.id))
        .collect()
}
