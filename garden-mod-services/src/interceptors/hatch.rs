//! `HatchEgg` tracking: counts hatched pets by species and rarity.

use crate::context::ServiceContext;
use crate::pets::{InventoryPetSnapshot, PetRarity, collect_inventory_pets, new_pets, pet_ids};
use crate::store::{AtomKey, AtomStore};
use garden_mod_hooks::{MessageHub, Registration, spawn_detached};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

pub(crate) fn register(hub: &MessageHub, ctx: &ServiceContext) -> Registration {
    let ctx = ctx.clone();
    hub.register("HatchEgg", move |_, _| {
        spawn_detached("HatchEgg", record_hatch(ctx.clone()));
        Ok(None)
    })
}

async fn read_pets(store: &dyn AtomStore) -> Vec<InventoryPetSnapshot> {
    match store.get(AtomKey::Inventory).await {
        Ok(inventory) => collect_inventory_pets(&inventory),
        Err(e) => {
            log::error!("[HatchEgg] Unable to read inventory: {}", e);
            Vec::new()
        }
    }
}

async fn record_hatch(ctx: ServiceContext) -> anyhow::Result<()> {
    let previous = pet_ids(&read_pets(&*ctx.store).await);
    let Some(pets) = wait_for_new_pets(&*ctx.store, &previous, ctx.timings.hatch_timeout).await else {
        log::debug!("[HatchEgg] No new pet within {:?}", ctx.timings.hatch_timeout);
        return Ok(());
    };
    for pet in new_pets(pets, &previous) {
        let rarity = PetRarity::from_mutations(&pet.mutations);
        log::info!("[HatchEgg] Hatched {} ({})", pet.species, rarity);
        ctx.stats.increment_pet_hatched(&pet.species, rarity);
    }
    Ok(())
}

fn has_new_pet(pets: &[InventoryPetSnapshot], previous: &HashSet<String>) -> bool {
    pets.iter().any(|p| !previous.contains(&p.id))
}

/// Wait until the inventory holds a pet whose id is not in `previous`.
///
/// Returns the full pet list at that point, or `None` once `timeout` has
/// passed and a last read still shows nothing new.
pub async fn wait_for_new_pets(
    store: &dyn AtomStore,
    previous: &HashSet<String>,
    timeout: Duration,
) -> Option<Vec<InventoryPetSnapshot>> {
    tokio::task::yield_now().await;

    let initial = read_pets(store).await;
    if has_new_pet(&initial, previous) {
        return Some(initial);
    }

    let mut changes = match store.subscribe(AtomKey::Inventory).await {
        Ok(rx) => rx,
        Err(e) => {
            log::error!("[HatchEgg] Unable to observe inventory: {}", e);
            return None;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        tokio::select! {
            next = changes.recv() => match next {
                Some(inventory) => {
                    let pets = collect_inventory_pets(&inventory);
                    if has_new_pet(&pets, previous) {
                        return Some(pets);
                    }
                }
                None => {
                    tokio::time::sleep_until(deadline).await;
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    let latest = read_pets(store).await;
    has_new_pet(&latest, previous).then_some(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAtomStore;
    use serde_json::json;
    use std::sync::Arc;

    fn pet(id: &str, species: &str) -> serde_json::Value {
        json!({"itemType": "Pet", "id": id, "petSpecies": species})
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_pet_from_feed() {
        let store = Arc::new(MemoryAtomStore::new());
        store.set(AtomKey::Inventory, json!([pet("p1", "Bunny")]));
        let previous: HashSet<String> = ["p1".to_string()].into();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { wait_for_new_pets(&*store, &previous, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.set(AtomKey::Inventory, json!([pet("p1", "Bunny"), pet("p2", "Chick")]));

        let pets = waiter.await.unwrap().unwrap();
        assert_eq!(pets.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_new_pet() {
        let store = MemoryAtomStore::new();
        store.set(AtomKey::Inventory, json!([pet("p1", "Bunny")]));
        let previous: HashSet<String> = ["p1".to_string()].into();

        let start = Instant::now();
        assert!(wait_for_new_pets(&store, &previous, Duration::from_secs(5)).await.is_none());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unobservable_inventory_gives_up() {
        let store = MemoryAtomStore::new();
        store.set_unavailable(AtomKey::Inventory, true);
        assert!(wait_for_new_pets(&store, &HashSet::new(), Duration::from_secs(5)).await.is_none());
    }
}
