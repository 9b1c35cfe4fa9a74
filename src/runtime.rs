//! Runtime composition.
//!
//! [`ModRuntime`] owns one instance of every long-lived piece (interceptor
//! hub, socket tracker, keybind engine and dispatcher, native keybind sync,
//! domain services) and routes keybind actions to them. The embedder feeds
//! it page events (sockets, keys, focus) and renders the [`UiCommand`]s it
//! emits.

use anyhow::Context;
use garden_mod_config::{KeyValueStore, ModSettings};
use garden_mod_hooks::{
    ClientMessage, GameMessage, GameSocket, HostLocator, MessageHub, SharedGlobals, SocketTracker,
    spawn_detached,
};
use garden_mod_keybindings::actions::PET_TEAM_ACTION_PREFIX;
use garden_mod_keybindings::{
    DispatchOptions, GameKeybindSync, KeyDispatcher, KeyEvent, KeyPhase, KeybindDispatch,
    KeybindEngine, NativeKeyRemapper, PetTeamInfo, ids,
};
use garden_mod_services::interceptors::toast_sell_blocked;
use garden_mod_services::{
    AtomKey, AtomStore, DomainInterceptors, GhostController, HarvestLocker, PlantCatalog,
    PlayerActions, SeedDeleter, ServiceContext, StatsRecorder, Toaster,
    install_domain_interceptors,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shop tabs reachable from keybinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopTab {
    Seeds,
    Eggs,
    Decors,
    Tools,
}

/// Requests for the overlay, which is rendered by the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    ToggleMenu,
    /// Start (`true`) or stop dragging the HUD.
    DragHud(bool),
    OpenShop(ShopTab),
    PreviousPetTeam,
    NextPetTeam,
    UsePetTeam(String),
}

/// How the runtime handled a keybind action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRoute {
    /// Sent to the overlay.
    Ui(UiCommand),
    /// Started a game-side flow (sell, remove object).
    Flow,
    /// Left to the game's own key handling (native remaps).
    Native,
    /// Nothing to do for this phase.
    Ignored,
}

/// Collaborators the runtime is built from.
#[derive(Clone)]
pub struct RuntimeParts {
    pub globals: Arc<dyn SharedGlobals>,
    pub host: Arc<dyn HostLocator>,
    pub storage: Arc<dyn KeyValueStore>,
    pub atoms: Arc<dyn AtomStore>,
    pub player: Arc<dyn PlayerActions>,
    pub toaster: Option<Arc<dyn Toaster>>,
    pub locker: Option<Arc<dyn HarvestLocker>>,
    pub catalog: Option<Arc<PlantCatalog>>,
    pub remapper: Option<Arc<dyn NativeKeyRemapper>>,
}

impl RuntimeParts {
    /// Parts with the default toaster, no locker, an empty catalog and no
    /// native key remapper.
    pub fn new(
        globals: Arc<dyn SharedGlobals>,
        host: Arc<dyn HostLocator>,
        storage: Arc<dyn KeyValueStore>,
        atoms: Arc<dyn AtomStore>,
        player: Arc<dyn PlayerActions>,
    ) -> Self {
        Self {
            globals,
            host,
            storage,
            atoms,
            player,
            toaster: None,
            locker: None,
            catalog: None,
            remapper: None,
        }
    }
}

pub struct ModRuntime {
    hub: MessageHub,
    sockets: SocketTracker,
    services: ServiceContext,
    keybinds: KeybindEngine,
    dispatcher: Mutex<KeyDispatcher>,
    game_sync: Option<GameKeybindSync>,
    ghost: GhostController,
    seeds: SeedDeleter,
    domain: Mutex<Option<DomainInterceptors>>,
    ui: mpsc::UnboundedSender<UiCommand>,
}

impl std::fmt::Debug for ModRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModRuntime")
            .field("hub", &self.hub)
            .field("sockets", &self.sockets)
            .field("domain_installed", &self.domain.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl ModRuntime {
    /// Build the runtime. UI commands arrive on the returned receiver.
    pub fn new(parts: RuntimeParts) -> (Self, mpsc::UnboundedReceiver<UiCommand>) {
        let settings = ModSettings::new(Arc::clone(&parts.storage));
        let stats = StatsRecorder::with_store(Arc::clone(&parts.storage));

        let mut services = ServiceContext::new(
            Arc::clone(&parts.globals),
            parts.atoms,
            Arc::clone(&parts.player),
            settings.clone(),
        )
        .with_stats(stats);
        if let Some(toaster) = parts.toaster {
            services = services.with_toaster(toaster);
        }
        if let Some(locker) = parts.locker {
            services = services.with_locker(locker);
        }
        if let Some(catalog) = parts.catalog {
            services = services.with_catalog(catalog);
        }

        let keybinds = KeybindEngine::new(parts.storage);
        keybinds.prime_cache();
        let dispatcher = KeyDispatcher::new(keybinds.clone(), DispatchOptions::default());
        let game_sync = parts
            .remapper
            .map(|remapper| GameKeybindSync::new(keybinds.clone(), remapper));

        let ghost = GhostController::new(parts.player, settings);
        let seeds = SeedDeleter::new(services.clone());
        let (ui, ui_rx) = mpsc::unbounded_channel();

        let runtime = Self {
            hub: MessageHub::new(Arc::clone(&parts.globals), parts.host),
            sockets: SocketTracker::new(parts.globals),
            services,
            keybinds,
            dispatcher: Mutex::new(dispatcher),
            game_sync,
            ghost,
            seeds,
            domain: Mutex::new(None),
            ui,
        };
        (runtime, ui_rx)
    }

    pub fn hub(&self) -> &MessageHub {
        &self.hub
    }

    pub fn sockets(&self) -> &SocketTracker {
        &self.sockets
    }

    pub fn services(&self) -> &ServiceContext {
        &self.services
    }

    pub fn keybinds(&self) -> &KeybindEngine {
        &self.keybinds
    }

    pub fn ghost(&self) -> &GhostController {
        &self.ghost
    }

    pub fn seeds(&self) -> &SeedDeleter {
        &self.seeds
    }

    pub fn game_sync(&self) -> Option<&GameKeybindSync> {
        self.game_sync.as_ref()
    }

    /// Install the send-call wrapper and the domain interceptors on it.
    ///
    /// Returns whether the domain interceptors were installed by this call.
    pub fn install_socket_hook(&self) -> bool {
        self.hub.ensure_installed();
        let mut domain = self.domain.lock();
        if domain.is_some() {
            return false;
        }
        *domain = install_domain_interceptors(&self.hub, &self.services);
        domain.is_some()
    }

    /// Remove the domain interceptors again (the send wrapper stays).
    pub fn uninstall_domain_interceptors(&self) {
        if let Some(domain) = self.domain.lock().take() {
            domain.uninstall();
        }
    }

    /// Start syncing the `game.*` keybinds with the native remapper, and
    /// ghost movement if it was left on.
    pub fn install_game_keybinds(&self) {
        if let Some(sync) = &self.game_sync {
            sync.install_once();
        }
        if self.services.settings.ghost_enabled(false) {
            self.ghost.start();
        }
    }

    /// Turn ghost movement on or off and remember the choice.
    pub fn set_ghost_enabled(&self, on: bool) {
        self.services.settings.set_ghost_enabled(on);
        if on {
            self.ghost.start();
        } else {
            self.ghost.stop();
        }
    }

    pub fn update_pet_teams(&self, teams: &[PetTeamInfo]) {
        self.keybinds.update_pet_keybinds(teams);
    }

    // ---------------------------------------------------------------------
    // Page sockets
    // ---------------------------------------------------------------------

    pub fn socket_created(&self, socket: &Arc<dyn GameSocket>) {
        self.sockets.track(socket);
    }

    pub fn socket_opened(&self, socket: Arc<dyn GameSocket>) -> Option<JoinHandle<()>> {
        self.sockets.on_open(socket)
    }

    pub fn socket_message(&self, socket: &Arc<dyn GameSocket>, text: &str) -> bool {
        self.sockets.on_message(socket, text)
    }

    // ---------------------------------------------------------------------
    // Keyboard
    // ---------------------------------------------------------------------

    /// Handle a capturing `keydown`. Ghost movement keys win over keybinds.
    ///
    /// Returns the dispatched action, if any, and whether ghost movement
    /// captured the key. Either one means the host should stop the event.
    pub fn key_down(&self, event: &KeyEvent) -> (Option<KeybindDispatch>, bool) {
        if self.ghost.key_down(event) {
            return (None, true);
        }
        let dispatch = self.dispatcher.lock().key_down(event);
        (self.handle_dispatch(dispatch), false)
    }

    pub fn key_up(&self, event: &KeyEvent) -> (Option<KeybindDispatch>, bool) {
        if self.ghost.key_up(event) {
            return (None, true);
        }
        let dispatch = self.dispatcher.lock().key_up(event);
        (self.handle_dispatch(dispatch), false)
    }

    /// Native actions are handed back as `None` so the event reaches the
    /// game's own (remapped) handler.
    fn handle_dispatch(&self, dispatch: Option<KeybindDispatch>) -> Option<KeybindDispatch> {
        let dispatch = dispatch?;
        match self.run_action(&dispatch.action_id, dispatch.phase) {
            ActionRoute::Native => None,
            _ => Some(dispatch),
        }
    }

    pub fn blur(&self) {
        self.dispatcher.lock().blur();
        self.ghost.blur();
    }

    pub fn visibility_changed(&self, visible: bool) {
        self.dispatcher.lock().visibility_changed(visible);
        self.ghost.visibility_changed(visible);
    }

    /// Route a keybind action.
    pub fn run_action(&self, action_id: &str, phase: KeyPhase) -> ActionRoute {
        let route = self.route(action_id, phase);
        match &route {
            ActionRoute::Ui(command) => {
                if self.ui.send(command.clone()).is_err() {
                    log::debug!("UI command {:?} dropped: no receiver", command);
                }
            }
            ActionRoute::Flow => log::debug!("Keybind {} started a flow", action_id),
            ActionRoute::Native | ActionRoute::Ignored => {}
        }
        route
    }

    fn route(&self, action_id: &str, phase: KeyPhase) -> ActionRoute {
        if action_id == ids::GUI_DRAG {
            return match phase {
                KeyPhase::Down => ActionRoute::Ui(UiCommand::DragHud(true)),
                KeyPhase::Up => ActionRoute::Ui(UiCommand::DragHud(false)),
                KeyPhase::Hold => ActionRoute::Ignored,
            };
        }
        if action_id.starts_with("game.") && action_id != ids::GAME_REMOVE_SLOT_75 {
            return ActionRoute::Native;
        }
        if phase != KeyPhase::Down {
            return ActionRoute::Ignored;
        }

        let command = match action_id {
            ids::GUI_TOGGLE => UiCommand::ToggleMenu,
            ids::SHOPS_SEEDS => UiCommand::OpenShop(ShopTab::Seeds),
            ids::SHOPS_EGGS => UiCommand::OpenShop(ShopTab::Eggs),
            ids::SHOPS_DECORS => UiCommand::OpenShop(ShopTab::Decors),
            ids::SHOPS_TOOLS => UiCommand::OpenShop(ShopTab::Tools),
            ids::PET_TEAM_PREV => UiCommand::PreviousPetTeam,
            ids::PET_TEAM_NEXT => UiCommand::NextPetTeam,
            ids::SELL_ALL => {
                self.spawn_flow("sell.sell-all", Self::sell_all_crops_flow(self.services.clone()));
                return ActionRoute::Flow;
            }
            ids::SELL_ALL_PETS => {
                let player = Arc::clone(&self.services.player);
                self.spawn_flow("sell.sell-all-pets", async move {
                    player.sell_all_pets().await.context("selling all pets")
                });
                return ActionRoute::Flow;
            }
            ids::GAME_REMOVE_SLOT_75 => {
                let atoms = Arc::clone(&self.services.store);
                let sockets = self.sockets.clone();
                self.spawn_flow("game.remove-slot-75", async move {
                    remove_object_under_player(&*atoms, &sockets).await.map(|_| ())
                });
                return ActionRoute::Flow;
            }
            other => match other.strip_prefix(PET_TEAM_ACTION_PREFIX) {
                Some(team) if !team.is_empty() => UiCommand::UsePetTeam(team.to_string()),
                _ => return ActionRoute::Ignored,
            },
        };
        ActionRoute::Ui(command)
    }

    fn spawn_flow<F>(&self, label: &'static str, flow: F)
    where
        F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        // Outside a runtime spawn_detached logs and skips.
        let _ = spawn_detached(label, flow);
    }

    async fn sell_all_crops_flow(services: ServiceContext) -> anyhow::Result<()> {
        if services.settings.block_sell_crops(false) {
            toast_sell_blocked(&services);
            return Ok(());
        }
        services
            .player
            .sell_all_crops()
            .await
            .context("selling all crops")
    }

    /// The sell-all keybind: refused with a toast while blocked, otherwise
    /// the player's own sell-all (which the interceptors then orchestrate).
    pub async fn sell_all_crops(&self) -> anyhow::Result<()> {
        Self::sell_all_crops_flow(self.services.clone()).await
    }
}

/// Garden tile types an object can be removed from.
const REMOVABLE_TILE_TYPES: [&str; 2] = ["Dirt", "Boardwalk"];

/// Build `RemoveGardenObject` for the tile under the player.
///
/// `None` when the tile is not a dirt or boardwalk tile, or its local index
/// is not a finite number.
pub fn remove_object_message(tile: &Value) -> Option<GameMessage> {
    let tile_type = match tile.get("tileType") {
        Some(Value::String(s)) => s.as_str(),
        _ => "",
    };
    if !REMOVABLE_TILE_TYPES.contains(&tile_type) {
        log::warn!("RemoveGardenObject: current tile type invalid: {}", tile);
        return None;
    }
    let index = match tile.get("localTileIndex") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(index) = index.filter(|i| i.is_finite() && i.abs() < i64::MAX as f64) else {
        log::warn!("RemoveGardenObject: localTileIndex invalid: {}", tile);
        return None;
    };
    Some(GameMessage::from(ClientMessage::RemoveGardenObject {
        slot: index.trunc() as i64,
        slot_type: tile_type.to_string(),
    }))
}

/// Read the current garden tile and send `RemoveGardenObject` for it
/// through the active game socket. Returns the message sent, if any.
pub async fn remove_object_under_player(
    atoms: &dyn AtomStore,
    sockets: &SocketTracker,
) -> anyhow::Result<Option<GameMessage>> {
    let tile = atoms
        .get(AtomKey::CurrentGardenTile)
        .await
        .context("reading the current garden tile")?;
    let Some(message) = remove_object_message(&tile) else {
        return Ok(None);
    };
    log::info!("RemoveGardenObject: sending {:?}", message.as_map());
    sockets
        .send_to_game(&message)
        .context("sending RemoveGardenObject")?;
    Ok(Some(message))
}
