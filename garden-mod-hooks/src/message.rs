//! Outgoing game message model.
//!
//! Messages on the wire are JSON objects `{ "type": "...", ...payload }`.
//! [`GameMessage`] keeps the raw object so unknown fields survive untouched;
//! [`ClientMessage`] types the shapes this layer builds or inspects.

use crate::error::HookError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameMessage(Map<String, Value>);

impl GameMessage {
    /// An empty message of the given type.
    pub fn new(message_type: &str) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(message_type.to_string()));
        Self(map)
    }

    /// Wrap a JSON value. Returns `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// The `type` field, if present and a non-empty string.
    pub fn message_type(&self) -> Option<&str> {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// An integral numeric field (`5` and `5.0` qualify, `5.5` does not).
    pub fn integer_field(&self, field: &str) -> Option<i64> {
        let number = self.0.get(field)?.as_number()?;
        if let Some(i) = number.as_i64() {
            return Some(i);
        }
        number
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn to_json(&self) -> Result<String, HookError> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Interpret as a typed client message, if it is one of the known shapes.
    pub fn to_client(&self) -> Option<ClientMessage> {
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }
}

impl From<ClientMessage> for GameMessage {
    fn from(message: ClientMessage) -> Self {
        match serde_json::to_value(&message) {
            Ok(Value::Object(map)) => Self(map),
            // Internally tagged structs always serialize to objects.
            _ => Self::new(message.message_type()),
        }
    }
}

/// Typed client-to-server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    HarvestCrop {
        slot: i64,
        #[serde(rename = "slotsIndex")]
        slots_index: i64,
    },
    RemoveGardenObject {
        slot: i64,
        #[serde(rename = "slotType")]
        slot_type: String,
    },
    WaterPlant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<i64>,
    },
    PlantSeed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        species: Option<String>,
    },
    PurchaseDecor {},
    PurchaseSeed {},
    PurchaseEgg {},
    PurchaseTool {},
    HatchEgg {},
    SellAllCrops {},
    SellPet {
        #[serde(rename = "itemId", default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
    },
}

impl ClientMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::HarvestCrop { .. } => "HarvestCrop",
            Self::RemoveGardenObject { .. } => "RemoveGardenObject",
            Self::WaterPlant { .. } => "WaterPlant",
            Self::PlantSeed { .. } => "PlantSeed",
            Self::PurchaseDecor {} => "PurchaseDecor",
            Self::PurchaseSeed {} => "PurchaseSeed",
            Self::PurchaseEgg {} => "PurchaseEgg",
            Self::PurchaseTool {} => "PurchaseTool",
            Self::HatchEgg {} => "HatchEgg",
            Self::SellAllCrops {} => "SellAllCrops",
            Self::SellPet { .. } => "SellPet",
        }
    }
}
