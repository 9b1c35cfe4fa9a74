//! Observe-only interceptors that bump activity counters.

use crate::context::ServiceContext;
use crate::stats::StatGroup;
use garden_mod_hooks::{MessageHub, Registration};

/// Watering a plant saves five minutes of growth.
pub const WATER_TIME_SAVED_MS: f64 = 5.0 * 60.0 * 1000.0;

/// `(message type, [(group, counter, amount)])`
const COUNTERS: &[(&str, &[(StatGroup, &str, f64)])] = &[
    ("RemoveGardenObject", &[(StatGroup::Garden, "totalDestroyed", 1.0)]),
    (
        "WaterPlant",
        &[
            (StatGroup::Garden, "watercanUsed", 1.0),
            (StatGroup::Garden, "waterTimeSavedMs", WATER_TIME_SAVED_MS),
        ],
    ),
    ("PlantSeed", &[(StatGroup::Garden, "totalPlanted", 1.0)]),
    ("PurchaseDecor", &[(StatGroup::Shop, "decorBought", 1.0)]),
    ("PurchaseSeed", &[(StatGroup::Shop, "seedsBought", 1.0)]),
    ("PurchaseEgg", &[(StatGroup::Shop, "eggsBought", 1.0)]),
    ("PurchaseTool", &[(StatGroup::Shop, "toolsBought", 1.0)]),
];

pub(crate) fn register(hub: &MessageHub, ctx: &ServiceContext) -> Vec<Registration> {
    COUNTERS
        .iter()
        .map(|&(message_type, increments)| {
            let stats = ctx.stats.clone();
            hub.register(message_type, move |_, _| {
                for &(group, name, by) in increments {
                    stats.increment(group, name, by);
                }
                Ok(None)
            })
        })
        .collect()
}
