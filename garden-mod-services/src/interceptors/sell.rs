//! Selling: the sell-all orchestration, sale counters and pet-food
//! auto-favorite.
//!
//! A user-initiated `SellAllCrops` is always dropped and replaced by an
//! orchestrated resend: protected crops are favorited first (the game never
//! sells favorites), the resend passes the interceptor once thanks to the
//! one-shot allow token, and the temporary favorites are removed after the
//! inventory changes.

use crate::context::ServiceContext;
use crate::player::item_id;
use crate::store::{AtomKey, get_or_null};
use crate::toast::ToastLevel;
use garden_mod_config::normalize_species_key;
use garden_mod_hooks::{
    MessageHub, OneShotFlag, Registration, Verdict, keys, spawn_detached,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tokio::task::JoinHandle;

pub const SELL_BLOCKED_TITLE: &str = "Selling crops blocked";
pub const SELL_BLOCKED_MESSAGE: &str = "Disable block in Misc to sell.";

/// The one-shot token that lets the next `SellAllCrops` through.
pub fn sell_all_allow_flag(ctx: &ServiceContext) -> OneShotFlag {
    OneShotFlag::new(ctx.globals.clone(), keys::ALLOW_NEXT_SELL_ALL_CROPS)
}

/// Toast shown whenever a sell-all is refused by the block setting.
pub fn toast_sell_blocked(ctx: &ServiceContext) {
    ctx.toaster
        .toast(SELL_BLOCKED_TITLE, SELL_BLOCKED_MESSAGE, ToastLevel::Warn);
}

pub(crate) fn register_sell_all(hub: &MessageHub, ctx: &ServiceContext) -> Registration {
    let ctx = ctx.clone();
    let allow = sell_all_allow_flag(&ctx);
    hub.register("SellAllCrops", move |_, _| {
        let passing_through = allow.consume();
        if ctx.settings.block_sell_crops(false) {
            log::info!("[SellAllCrops] Blocked by setting");
            toast_sell_blocked(&ctx);
            return Ok(Some(Verdict::Drop));
        }
        if passing_through {
            spawn_detached("SellAllCrops", count_crops_sold(ctx.clone()));
            return Ok(None);
        }
        spawn_detached("SellAllCrops", orchestrate_sell_all(ctx.clone(), allow.clone()));
        Ok(Some(Verdict::Drop))
    })
}

pub(crate) fn register_sell_pet(hub: &MessageHub, ctx: &ServiceContext) -> Registration {
    let ctx = ctx.clone();
    hub.register("SellPet", move |_, _| {
        ctx.stats.increment_shop("petsSoldCount", 1.0);
        let ctx = ctx.clone();
        spawn_detached("SellPet", async move {
            if let Some(value) = positive_amount(&get_or_null(&*ctx.store, AtomKey::TotalPetSellPrice).await) {
                ctx.stats.increment_shop("petsSoldValue", value);
            }
            Ok(())
        });
        Ok(None)
    })
}

/// A finite, strictly positive amount from a number or numeric string.
fn positive_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

async fn count_crops_sold(ctx: ServiceContext) -> anyhow::Result<()> {
    let items = get_or_null(&*ctx.store, AtomKey::CropItemsToSell).await;
    let count = items.as_array().map_or(0, Vec::len);
    if count > 0 {
        ctx.stats.increment_shop("cropsSoldCount", count as f64);
    }
    if let Some(value) = positive_amount(&get_or_null(&*ctx.store, AtomKey::TotalCropSellPrice).await) {
        ctx.stats.increment_shop("cropsSoldValue", value);
    }
    Ok(())
}

/// Ids of inventory items whose species is in `protected` (normalized keys).
pub fn protected_item_ids(items: &[Value], protected: &BTreeSet<String>) -> Vec<String> {
    if protected.is_empty() {
        return Vec::new();
    }
    items
        .iter()
        .filter(|item| {
            let species = item.get("species").and_then(Value::as_str).unwrap_or_default();
            protected.contains(&normalize_species_key(species))
        })
        .filter_map(item_id)
        .collect()
}

async fn unfavorite(ctx: &ServiceContext, ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    if let Err(e) = ctx.player.ensure_favorites(ids, false).await {
        log::warn!("[SellAllCrops] Could not remove temporary favorites: {}", e);
    }
}

/// Favorite protected crops, resend sell-all through the allow token, wait
/// for the inventory to change, then drop the temporary favorites.
pub async fn orchestrate_sell_all(ctx: ServiceContext, allow: OneShotFlag) -> anyhow::Result<()> {
    let items = ctx.player.crop_inventory().await.unwrap_or_else(|e| {
        log::warn!("[SellAllCrops] Crop inventory unavailable: {}", e);
        Vec::new()
    });
    let favorites: HashSet<String> = ctx.player.favorite_ids().await.unwrap_or_default();
    let protected = ctx.settings.pet_food_species();

    let to_favorite: Vec<String> = protected_item_ids(&items, &protected)
        .into_iter()
        .filter(|id| !favorites.contains(id))
        .collect();

    if !to_favorite.is_empty() {
        log::debug!("[SellAllCrops] Protecting {} crops", to_favorite.len());
        if let Err(e) = ctx.player.ensure_favorites(&to_favorite, true).await {
            unfavorite(&ctx, &to_favorite).await;
            return Err(anyhow::Error::new(e).context("favoriting protected crops"));
        }
    }

    let mut changes = match ctx.player.subscribe_crop_inventory_diff().await {
        Ok(rx) => Some(rx),
        Err(e) => {
            log::debug!("[SellAllCrops] No inventory feed: {}", e);
            None
        }
    };

    {
        let _token = allow.arm();
        if let Err(e) = ctx.player.sell_all_crops().await {
            log::warn!("[SellAllCrops] Resend failed: {}", e);
        }
    }

    if let Some(rx) = changes.as_mut()
        && tokio::time::timeout(ctx.timings.sell_settle_timeout, rx.recv())
            .await
            .is_err()
    {
        log::debug!("[SellAllCrops] Inventory did not change after resend");
    }

    unfavorite(&ctx, &to_favorite).await;
    Ok(())
}

/// Favorite newly added crops of protected species while the pet-food
/// toggle is on.
pub(crate) fn spawn_auto_favorite(ctx: &ServiceContext) -> Option<JoinHandle<()>> {
    let ctx = ctx.clone();
    spawn_detached("auto-favorite", async move {
        let mut diffs = ctx.player.subscribe_crop_inventory_diff().await?;
        while let Some(diff) = diffs.recv().await {
            if diff.added.is_empty() || !ctx.settings.pet_food_toggle(false) {
                continue;
            }
            let protected: HashSet<String> = protected_item_ids(&diff.inventory, &ctx.settings.pet_food_species())
                .into_iter()
                .collect();
            let to_favorite: Vec<String> = diff
                .added
                .iter()
                .filter(|id| protected.contains(*id))
                .cloned()
                .collect();
            if to_favorite.is_empty() {
                continue;
            }
            if let Err(e) = ctx.player.ensure_favorites(&to_favorite, true).await {
                log::warn!("Auto-favorite of {} crops failed: {}", to_favorite.len(), e);
            }
        }
        Ok(())
    })
}
