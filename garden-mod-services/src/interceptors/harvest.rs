//! `HarvestCrop` gate: asks the locker before a crop is harvested.

use super::mirror::GardenMirror;
use crate::context::ServiceContext;
use crate::garden::harvest_target;
use crate::locker::HarvestRequest;
use crate::store::AtomKey;
use garden_mod_hooks::{GameMessage, MessageHub, Registration, Verdict, spawn_detached};
use std::sync::Arc;

pub(crate) fn register(hub: &MessageHub, ctx: &ServiceContext, mirror: Arc<GardenMirror>) -> Registration {
    let ctx = ctx.clone();
    hub.register("HarvestCrop", move |message, _| {
        Ok(harvest_verdict(&ctx, &mirror, message))
    })
}

fn locker_enabled(ctx: &ServiceContext) -> bool {
    ctx.locker.enabled().unwrap_or_else(|e| {
        log::warn!("[HarvestCrop] Locker state unavailable: {:#}", e);
        false
    })
}

fn locker_allows(ctx: &ServiceContext, request: &HarvestRequest) -> bool {
    ctx.locker.allows_harvest(request).unwrap_or_else(|e| {
        log::warn!("[HarvestCrop] Locker failed, allowing harvest: {:#}", e);
        true
    })
}

fn harvest_verdict(ctx: &ServiceContext, mirror: &GardenMirror, message: &GameMessage) -> Option<Verdict> {
    let slot = message.integer_field("slot")?;
    let slots_index = message.integer_field("slotsIndex")?;

    let request = mirror.with_garden(|garden| {
        harvest_target(garden?, slot, slots_index).map(|target| target.request(&ctx.catalog))
    })?;

    if locker_enabled(ctx) && !locker_allows(ctx, &request) {
        log::info!(
            "[HarvestCrop] Blocked by locker: slot={} slotsIndex={} seedKey={:?} sizePercent={} mutations={:?}",
            slot,
            slots_index,
            request.seed_key,
            request.size_percent,
            request.mutations
        );
        return Some(Verdict::Drop);
    }

    ctx.stats.increment_garden("totalHarvested", 1.0);

    let store = Arc::clone(&ctx.store);
    spawn_detached("HarvestCrop", async move {
        let garden = store.get(AtomKey::Garden).await?;
        let crop_slot = garden.pointer(&format!("/tileObjects/{slot}/slots/{slots_index}"));
        log::debug!(
            "[HarvestCrop] slot={} slotsIndex={} cropSlot={}",
            slot,
            slots_index,
            crop_slot.map_or_else(|| "none".to_string(), |v| v.to_string())
        );
        Ok(())
    });
    None
}
