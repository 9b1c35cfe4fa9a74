//! Integration tests for garden-mod-services.
//!
//! A full in-process stack: a room connection whose send is wrapped by the
//! hub, the domain interceptors installed on top, and memory-backed store,
//! player and settings.

use garden_mod_config::{MemoryStore, ModSettings};
use garden_mod_hooks::{
    GameMessage, HostSlot, LocalGlobals, MemoryConnection, MessageHub, SendFn, SendSlot,
    SharedGlobals, keys,
};
use garden_mod_services::interceptors::orchestrate_sell_all;
use garden_mod_services::interceptors::sell_all_allow_flag;
use garden_mod_services::{
    AtomKey, DeleteOptions, DeleteOutcome, DeleteProgress, HarvestLocker, HarvestRequest,
    MemoryAtomStore, MemoryPlayer, MemoryToaster, PlantCatalog, PlayerCall, SeedDeleter,
    ServiceContext, ServiceTimings, StatGroup, ToastLevel, install_domain_interceptors,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

struct CaptureLogger;

static CAPTURED: std::sync::Mutex<Vec<String>> = std::sync::Mutex::new(Vec::new());
static LOGGER: CaptureLogger = CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        if let Ok(mut lines) = CAPTURED.lock() {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn capture_logs() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}

fn logged(needle: &str) -> bool {
    CAPTURED
        .lock()
        .map(|lines| lines.iter().any(|l| l.contains(needle)))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct DenyAll;

impl HarvestLocker for DenyAll {
    fn enabled(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn allows_harvest(&self, _: &HarvestRequest) -> anyhow::Result<bool> {
        Ok(false)
    }
}

struct Game {
    connection: Arc<MemoryConnection>,
    sent: Arc<Mutex<Vec<Value>>>,
    globals: Arc<LocalGlobals>,
    hub: MessageHub,
    store: Arc<MemoryAtomStore>,
    player: Arc<MemoryPlayer>,
    settings: ModSettings,
    toaster: Arc<MemoryToaster>,
    ctx: ServiceContext,
}

impl Game {
    fn new() -> Self {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let s = sent.clone();
        let send: SendFn = Arc::new(move |msg: GameMessage, _: &[Value]| s.lock().push(msg.into_value()));
        let connection = Arc::new(MemoryConnection::with_send(SendSlot::Static, send));
        let slot = Arc::new(HostSlot::new());
        slot.set(connection.clone());

        let globals = Arc::new(LocalGlobals::new());
        let hub = MessageHub::new(globals.clone(), slot);
        hub.ensure_installed();

        let store = Arc::new(MemoryAtomStore::new());
        let player = Arc::new(MemoryPlayer::with_connection(connection.clone()));
        let settings = ModSettings::new(Arc::new(MemoryStore::new()));
        let toaster = Arc::new(MemoryToaster::new());
        let catalog = PlantCatalog::from_value(json!({
            "Carrot": {"crop": {"maxScale": 2.0}},
            "Tulip": {"seed": {"name": "Tulip Seed"}},
        }));
        let ctx = ServiceContext::new(globals.clone(), store.clone(), player.clone(), settings.clone())
            .with_toaster(toaster.clone())
            .with_catalog(Arc::new(catalog))
            .with_timings(ServiceTimings {
                hatch_timeout: Duration::from_secs(5),
                sell_settle_timeout: Duration::from_secs(1),
            });

        Self {
            connection,
            sent,
            globals,
            hub,
            store,
            player,
            settings,
            toaster,
            ctx,
        }
    }

    fn send(&self, value: Value) {
        let msg = GameMessage::from_value(value).unwrap();
        assert!(self.connection.send(msg, &[]));
    }

    fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_string))
            .collect()
    }
}

/// Let detached tasks run; timers advance because the clock is paused.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn garden_with_carrot() -> Value {
    json!({
        "tileObjects": {
            "5": {
                "objectType": "plant",
                "species": "Carrot",
                "slots": [{"species": "Carrot", "targetScale": 1.5, "mutations": ["Gold"]}]
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Harvest gate
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn locker_refusal_drops_harvest_and_logs() {
    capture_logs();
    let mut game = Game::new();
    game.ctx = game.ctx.clone().with_locker(Arc::new(DenyAll));
    game.store.set(AtomKey::Garden, garden_with_carrot());
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();
    settle().await;

    game.send(json!({"type": "HarvestCrop", "slot": 5, "slotsIndex": 0}));

    assert!(game.sent().is_empty());
    assert!(logged("[HarvestCrop] Blocked by locker"));
    assert_eq!(game.ctx.stats.get(StatGroup::Garden, "totalHarvested"), 0.0);
}

#[tokio::test(start_paused = true)]
async fn allowed_harvest_is_forwarded_and_counted() {
    let game = Game::new();
    game.store.set(AtomKey::Garden, garden_with_carrot());
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();
    settle().await;

    game.send(json!({"type": "HarvestCrop", "slot": 5, "slotsIndex": 0}));
    // A harvest the mirror cannot resolve is passed through untouched.
    game.send(json!({"type": "HarvestCrop", "slot": 99, "slotsIndex": 0}));

    assert_eq!(game.sent_types(), vec!["HarvestCrop", "HarvestCrop"]);
    assert_eq!(game.ctx.stats.get(StatGroup::Garden, "totalHarvested"), 1.0);
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn activity_counters() {
    let game = Game::new();
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    for _ in 0..3 {
        game.send(json!({"type": "WaterPlant", "slot": 1}));
    }
    game.send(json!({"type": "PlantSeed", "slot": 2, "species": "Carrot"}));
    game.send(json!({"type": "PurchaseEgg", "eggId": "CommonEgg"}));
    game.send(json!({"type": "RemoveGardenObject", "slot": 3, "slotType": "Dirt"}));

    assert_eq!(game.sent().len(), 6);
    let stats = game.ctx.stats.snapshot();
    assert_eq!(stats.get(StatGroup::Garden, "watercanUsed"), 3.0);
    assert_eq!(stats.get(StatGroup::Garden, "waterTimeSavedMs"), 900_000.0);
    assert_eq!(stats.get(StatGroup::Garden, "totalPlanted"), 1.0);
    assert_eq!(stats.get(StatGroup::Garden, "totalDestroyed"), 1.0);
    assert_eq!(stats.get(StatGroup::Shop, "eggsBought"), 1.0);
}

#[tokio::test(start_paused = true)]
async fn pet_sale_counts_value_when_positive() {
    let game = Game::new();
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    game.store.set(AtomKey::TotalPetSellPrice, json!(40));
    game.send(json!({"type": "SellPet", "itemId": "p1"}));
    settle().await;
    game.store.set(AtomKey::TotalPetSellPrice, json!(null));
    game.send(json!({"type": "SellPet", "itemId": "p2"}));
    settle().await;

    assert_eq!(game.sent_types(), vec!["SellPet", "SellPet"]);
    assert_eq!(game.ctx.stats.get(StatGroup::Shop, "petsSoldCount"), 2.0);
    assert_eq!(game.ctx.stats.get(StatGroup::Shop, "petsSoldValue"), 40.0);
}

// ---------------------------------------------------------------------------
// Sell-all orchestration
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sell_all_protects_pet_food_and_resends_once() {
    let game = Game::new();
    game.settings.set_pet_food_species(["Carrot"]);
    game.player.set_crop_inventory(vec![
        json!({"id": "c1", "species": "Carrot"}),
        json!({"id": "c2", "species": "Carrot"}),
        json!({"id": "t1", "species": "Tulip"}),
    ]);
    game.player.set_favorites(["c2".to_string()]);
    game.store.set(AtomKey::CropItemsToSell, json!([{"id": "t1"}]));
    game.store.set(AtomKey::TotalCropSellPrice, json!(150));
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    game.send(json!({"type": "SellAllCrops"}));
    assert!(game.sent().is_empty(), "user sell-all is replaced by the orchestrated one");

    settle().await;
    game.player.set_crop_inventory(vec![
        json!({"id": "c1", "species": "Carrot"}),
        json!({"id": "c2", "species": "Carrot"}),
    ]);
    settle().await;

    assert_eq!(game.sent_types(), vec!["SellAllCrops"]);
    assert!(!game.globals.read_flag(keys::ALLOW_NEXT_SELL_ALL_CROPS));
    assert_eq!(
        game.player.calls(),
        vec![
            PlayerCall::EnsureFavorites {
                ids: vec!["c1".to_string()],
                on: true
            },
            PlayerCall::SellAllCrops,
            PlayerCall::EnsureFavorites {
                ids: vec!["c1".to_string()],
                on: false
            },
        ]
    );
    assert_eq!(game.player.favorites(), ["c2".to_string()].into());
    assert_eq!(game.ctx.stats.get(StatGroup::Shop, "cropsSoldCount"), 1.0);
    assert_eq!(game.ctx.stats.get(StatGroup::Shop, "cropsSoldValue"), 150.0);
}

#[tokio::test(start_paused = true)]
async fn sell_all_finishes_when_inventory_never_changes() {
    let game = Game::new();
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    game.send(json!({"type": "SellAllCrops"}));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(game.sent_types(), vec!["SellAllCrops"]);
    assert_eq!(game.player.calls(), vec![PlayerCall::SellAllCrops]);
}

#[tokio::test(start_paused = true)]
async fn blocked_sell_all_toasts_and_sends_nothing() {
    let game = Game::new();
    game.settings.set_block_sell_crops(true);
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    game.send(json!({"type": "SellAllCrops"}));
    settle().await;

    assert!(game.sent().is_empty());
    assert!(game.player.calls().is_empty());
    let toast = game.toaster.last().unwrap();
    assert_eq!(toast.title, "Selling crops blocked");
    assert_eq!(toast.message, "Disable block in Misc to sell.");
    assert_eq!(toast.level, ToastLevel::Warn);
}

#[tokio::test(start_paused = true)]
async fn failed_favoriting_aborts_the_sale() {
    let game = Game::new();
    game.settings.set_pet_food_species(["Carrot"]);
    game.player.set_crop_inventory(vec![json!({"id": "c1", "species": "Carrot"})]);
    game.player.fail_action("ensure_favorites");
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    let allow = sell_all_allow_flag(&game.ctx);
    let result = orchestrate_sell_all(game.ctx.clone(), allow.clone()).await;

    assert!(result.is_err());
    assert!(game.sent().is_empty());
    assert!(!game.player.calls().contains(&PlayerCall::SellAllCrops));
    assert!(!allow.is_armed());
}

// ---------------------------------------------------------------------------
// Hatching and auto-favorite
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn hatch_counts_new_pet_by_rarity() {
    let game = Game::new();
    game.store.set(
        AtomKey::Inventory,
        json!({"items": [{"itemType": "Pet", "id": "p1", "petSpecies": "Bunny"}]}),
    );
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    game.send(json!({"type": "HatchEgg", "slot": 4}));
    settle().await;
    game.store.set(
        AtomKey::Inventory,
        json!({"items": [
            {"itemType": "Pet", "id": "p1", "petSpecies": "Bunny"},
            {"item": {"itemType": "pet", "id": "p2", "petSpecies": "Bunny", "mutations": ["Rainbow"]}}
        ]}),
    );
    settle().await;

    assert_eq!(game.sent_types(), vec!["HatchEgg"]);
    assert_eq!(game.ctx.stats.get(StatGroup::Pets, "hatched.Bunny.rainbow"), 1.0);
}

#[tokio::test(start_paused = true)]
async fn hatch_without_new_pet_counts_nothing() {
    let game = Game::new();
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();

    game.send(json!({"type": "HatchEgg", "slot": 4}));
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(game.ctx.stats.snapshot().pets.is_empty());
}

#[tokio::test(start_paused = true)]
async fn auto_favorite_follows_pet_food_toggle() {
    let game = Game::new();
    game.settings.set_pet_food_species(["Carrot"]);
    let _installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();
    settle().await;

    game.player.set_crop_inventory(vec![json!({"id": "c1", "species": "Carrot"})]);
    settle().await;
    assert!(game.player.favorites().is_empty(), "toggle is off");

    game.settings.set_pet_food_toggle(true);
    game.player.set_crop_inventory(vec![
        json!({"id": "c1", "species": "Carrot"}),
        json!({"id": "c3", "species": "carrot"}),
        json!({"id": "t1", "species": "Tulip"}),
    ]);
    settle().await;
    assert_eq!(game.player.favorites(), ["c3".to_string()].into());
}

// ---------------------------------------------------------------------------
// Install guard
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn install_is_guarded_and_reversible() {
    let game = Game::new();
    let installed = install_domain_interceptors(&game.hub, &game.ctx).unwrap();
    assert!(install_domain_interceptors(&game.hub, &game.ctx).is_none());
    assert!(game.globals.read_flag(keys::HARVEST_HOOK_INSTALLED));

    installed.uninstall();
    assert!(!game.globals.read_flag(keys::HARVEST_HOOK_INSTALLED));

    game.settings.set_block_sell_crops(true);
    game.send(json!({"type": "SellAllCrops"}));
    assert_eq!(game.sent_types(), vec!["SellAllCrops"]);
}

// ---------------------------------------------------------------------------
// Seed deleter
// ---------------------------------------------------------------------------

fn seed_game() -> (Game, SeedDeleter) {
    let game = Game::new();
    game.store.set(
        AtomKey::SeedInventory,
        json!([
            {"itemType": "Seed", "species": "Carrot", "quantity": 60},
            {"itemType": "Seed", "species": "Tulip", "quantity": 3}
        ]),
    );
    let deleter = SeedDeleter::new(game.ctx.clone());
    (game, deleter)
}

fn wishes(game: &Game) -> usize {
    game.player
        .calls()
        .iter()
        .filter(|c| matches!(c, PlayerCall::Wish(_)))
        .count()
}

#[tokio::test(start_paused = true)]
async fn seed_deletion_runs_in_batches() {
    let (game, deleter) = seed_game();
    deleter.refresh_stock().await;
    assert!(deleter.toggle_selection("Carrot Seed"));
    assert_eq!(deleter.selection()[0].qty, 60);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let p = progress.clone();
    let outcome = deleter
        .delete_selected(DeleteOptions {
            on_progress: Some(Arc::new(move |info: &DeleteProgress| p.lock().push(info.done))),
            ..DeleteOptions::default()
        })
        .await;

    assert_eq!(outcome, DeleteOutcome::Deleted { total: 60, species: 1 });
    assert_eq!(*progress.lock(), vec![25, 50, 60]);
    assert_eq!(wishes(&game), 60);
    assert!(deleter.selection().is_empty());
    let toasts = game.toaster.toasts();
    assert_eq!(toasts[0].message, "Deleting 60 seeds across 1 species...");
    assert_eq!(toasts[1].message, "Deleted 60 seeds (1 species).");
    assert_eq!(toasts[1].level, ToastLevel::Success);
}

#[tokio::test(start_paused = true)]
async fn seed_deletion_caps_to_stock() {
    let (game, deleter) = seed_game();
    let outcome = deleter
        .delete_selected(DeleteOptions {
            selection: Some(vec![("Tulip Seed".to_string(), 10)]),
            keep_selection: true,
            ..DeleteOptions::default()
        })
        .await;

    assert_eq!(outcome, DeleteOutcome::Deleted { total: 3, species: 1 });
    assert_eq!(
        game.toaster.toasts()[0].message,
        "Requested 10 but only 3 available. Proceeding."
    );
}

#[tokio::test(start_paused = true)]
async fn seed_deletion_with_nothing_to_do() {
    let (game, deleter) = seed_game();
    assert_eq!(
        deleter.delete_selected(DeleteOptions::default()).await,
        DeleteOutcome::NothingSelected
    );
    assert_eq!(
        deleter
            .delete_selected(DeleteOptions {
                selection: Some(vec![("Pumpkin Seed".to_string(), 2)]),
                ..DeleteOptions::default()
            })
            .await,
        DeleteOutcome::NothingAvailable
    );
    let messages: Vec<String> = game.toaster.toasts().into_iter().map(|t| t.message).collect();
    assert_eq!(messages, vec!["No seeds selected.", "Nothing to delete (not in inventory)."]);
}

#[tokio::test(start_paused = true)]
async fn seed_deletion_is_exclusive_and_cancellable() {
    let (game, deleter) = seed_game();
    let options = DeleteOptions {
        selection: Some(vec![("Carrot Seed".to_string(), 60)]),
        ..DeleteOptions::default()
    };

    let running = {
        let deleter = deleter.clone();
        let options = options.clone();
        tokio::spawn(async move { deleter.delete_selected(options).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(deleter.is_running());

    assert_eq!(deleter.delete_selected(options).await, DeleteOutcome::AlreadyRunning);
    deleter.cancel();

    assert_eq!(
        running.await.unwrap(),
        DeleteOutcome::Cancelled { done: 25, total: 60 }
    );
    assert!(!deleter.is_running());
    assert_eq!(wishes(&game), 25);
    let last = game.toaster.last().unwrap();
    assert_eq!(last.message, "Deletion cancelled.");
    assert_eq!(last.level, ToastLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn selected_item_name_toggles_selection() {
    let (game, deleter) = seed_game();
    deleter.refresh_stock().await;
    let _watch = deleter.watch_selected_item_name().unwrap();
    settle().await;

    game.store.set(AtomKey::SelectedItemName, json!("Tulip Seed"));
    settle().await;
    assert_eq!(deleter.selection()[0].max_qty, 3);

    game.store.set(AtomKey::SelectedItemName, json!(null));
    game.store.set(AtomKey::SelectedItemName, json!(" Tulip Seed "));
    settle().await;
    assert!(deleter.selection().is_empty());
}
