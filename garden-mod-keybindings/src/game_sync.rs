//! Reconciling `game.*` keybinds with the game's native key remapper.
//!
//! The game listens for fixed physical keys (Space, E, W, S, A, D). When the
//! user binds a game action to another key, a remap from the chosen key to
//! the native one is installed; with hold detection enabled a 10 Hz
//! rapid-fire is added on the chosen key. Every sync first tears down what
//! the previous sync installed, so syncing any number of times leaves exactly
//! one remap per action.

use crate::actions::ids;
use crate::engine::{KeybindEngine, KeybindSubscription};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Rapid-fire rate used for hold-to-repeat game actions.
pub const RAPID_FIRE_RATE_HZ: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemapError {
    #[error("native key remapper is not available")]
    Unavailable,
    #[error("remapper rejected '{combo}': {reason}")]
    Rejected { combo: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RapidFireMode {
    /// Emit discrete down/up taps.
    Tap,
    /// Emit repeated downs while held.
    Hold,
}

/// A synthetic key-repeat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RapidFire {
    pub trigger: String,
    pub emit: String,
    pub mode: RapidFireMode,
    pub rate_hz: u32,
}

/// The game's own key-remapping surface.
///
/// Combos use the persisted hotkey string form (`Alt+KeyQ`, `Space`).
pub trait NativeKeyRemapper: Send + Sync {
    fn block(&self, combo: &str) -> Result<(), RemapError>;
    fn unblock(&self, combo: &str) -> Result<(), RemapError>;
    /// Every active remap as `(physical combo, native combo)`.
    fn current(&self) -> Result<Vec<(String, String)>, RemapError>;
    fn remove(&self, from_combo: &str) -> Result<(), RemapError>;
    /// Make `new_physical` act as `old_base`.
    fn replace(&self, old_base: &str, new_physical: &str) -> Result<(), RemapError>;
    fn start_rapid_fire(&self, request: RapidFire) -> Result<(), RemapError>;
    fn stop_rapid_fire(&self, trigger: &str) -> Result<(), RemapError>;
}

/// In-memory remapper for hosts without a native one, and for tests.
#[derive(Debug, Default)]
pub struct MemoryKeyRemapper {
    state: Mutex<MemoryRemapState>,
}

#[derive(Debug, Default)]
struct MemoryRemapState {
    remaps: HashMap<String, String>,
    blocked: HashSet<String>,
    rapid_fire: HashMap<String, RapidFire>,
}

impl MemoryKeyRemapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Native combo that `physical` currently produces, if remapped.
    pub fn remap_for(&self, physical: &str) -> Option<String> {
        self.state.lock().remaps.get(physical).cloned()
    }

    pub fn remap_count(&self) -> usize {
        self.state.lock().remaps.len()
    }

    pub fn is_blocked(&self, combo: &str) -> bool {
        self.state.lock().blocked.contains(combo)
    }

    pub fn rapid_fire(&self, trigger: &str) -> Option<RapidFire> {
        self.state.lock().rapid_fire.get(trigger).cloned()
    }

    pub fn rapid_fire_count(&self) -> usize {
        self.state.lock().rapid_fire.len()
    }
}

impl NativeKeyRemapper for MemoryKeyRemapper {
    fn block(&self, combo: &str) -> Result<(), RemapError> {
        self.state.lock().blocked.insert(combo.to_string());
        Ok(())
    }

    fn unblock(&self, combo: &str) -> Result<(), RemapError> {
        self.state.lock().blocked.remove(combo);
        Ok(())
    }

    fn current(&self) -> Result<Vec<(String, String)>, RemapError> {
        Ok(self
            .state
            .lock()
            .remaps
            .iter()
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect())
    }

    fn remove(&self, from_combo: &str) -> Result<(), RemapError> {
        self.state.lock().remaps.remove(from_combo);
        Ok(())
    }

    fn replace(&self, old_base: &str, new_physical: &str) -> Result<(), RemapError> {
        self.state
            .lock()
            .remaps
            .insert(new_physical.to_string(), old_base.to_string());
        Ok(())
    }

    fn start_rapid_fire(&self, request: RapidFire) -> Result<(), RemapError> {
        self.state
            .lock()
            .rapid_fire
            .insert(request.trigger.clone(), request);
        Ok(())
    }

    fn stop_rapid_fire(&self, trigger: &str) -> Result<(), RemapError> {
        self.state.lock().rapid_fire.remove(trigger);
        Ok(())
    }
}

/// Game actions the native remapper knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameKeybind {
    Action,
    Inventory,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

impl GameKeybind {
    pub const ALL: [GameKeybind; 6] = [
        Self::Action,
        Self::Inventory,
        Self::MoveUp,
        Self::MoveDown,
        Self::MoveLeft,
        Self::MoveRight,
    ];

    pub fn action_id(self) -> &'static str {
        match self {
            Self::Action => ids::GAME_ACTION,
            Self::Inventory => ids::GAME_INVENTORY,
            Self::MoveUp => ids::GAME_MOVE_UP,
            Self::MoveDown => ids::GAME_MOVE_DOWN,
            Self::MoveLeft => ids::GAME_MOVE_LEFT,
            Self::MoveRight => ids::GAME_MOVE_RIGHT,
        }
    }

    /// The physical key the game itself listens for. Layout independent:
    /// AZERTY Z and Q are `KeyW` and `KeyA`.
    pub fn native_code(self) -> &'static str {
        match self {
            Self::Action => "Space",
            Self::Inventory => "KeyE",
            Self::MoveUp => "KeyW",
            Self::MoveDown => "KeyS",
            Self::MoveLeft => "KeyA",
            Self::MoveRight => "KeyD",
        }
    }

    pub fn from_action_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.action_id() == id)
    }
}

#[derive(Debug, Clone)]
struct ActiveRemap {
    combo: String,
    replaced: bool,
    rapid_fire: bool,
}

#[derive(Default)]
struct SyncState {
    active: HashMap<GameKeybind, ActiveRemap>,
    blockers: HashSet<String>,
    blocked_combos: HashSet<String>,
    installed: bool,
    subscriptions: Vec<KeybindSubscription>,
}

struct SyncInner {
    engine: KeybindEngine,
    remapper: Arc<dyn NativeKeyRemapper>,
    state: Mutex<SyncState>,
}

impl SyncInner {
    fn purge_target_bindings(&self, emit: &str) {
        if let Err(e) = self.remapper.unblock(emit) {
            log::debug!("unblock {} failed: {}", emit, e);
        }
        match self.remapper.current() {
            Ok(remaps) => {
                for (from, to) in remaps {
                    if to.rsplit('+').next() == Some(emit)
                        && let Err(e) = self.remapper.remove(&from)
                    {
                        log::debug!("remove remap {} -> {} failed: {}", from, to, e);
                    }
                }
            }
            Err(e) => log::debug!("listing native remaps failed: {}", e),
        }
    }

    fn sync(&self, game: GameKeybind) {
        let emit = game.native_code();
        let mut state = self.state.lock();

        self.purge_target_bindings(emit);
        // The purge unblocked the native key; forget that it was blocked.
        state.blocked_combos.remove(emit);

        if let Some(prev) = state.active.remove(&game)
            && prev.rapid_fire
            && let Err(e) = self.remapper.stop_rapid_fire(&prev.combo)
        {
            log::debug!("stop rapid-fire on {} failed: {}", prev.combo, e);
        }

        let Some(combo) = self.engine.get_keybind(game.action_id()).map(|hk| hk.to_string())
        else {
            log::debug!("{} unbound, native {} left untouched", game.action_id(), emit);
            if game == GameKeybind::Action {
                self.apply_blockers(&mut state);
            }
            return;
        };
        let hold_enabled = self.engine.keybind_hold_detection(game.action_id());

        let mut replaced = false;
        if combo != emit {
            match self.remapper.replace(emit, &combo) {
                Ok(()) => replaced = true,
                Err(e) => log::warn!("Failed to remap {} -> {}: {}", combo, emit, e),
            }
        }

        let mut rapid_fire = false;
        if hold_enabled {
            let request = RapidFire {
                trigger: combo.clone(),
                emit: combo.clone(),
                mode: RapidFireMode::Tap,
                rate_hz: RAPID_FIRE_RATE_HZ,
            };
            match self.remapper.start_rapid_fire(request) {
                Ok(()) => rapid_fire = true,
                Err(e) => log::warn!("Failed to start rapid-fire on {}: {}", combo, e),
            }
        }

        log::debug!(
            "Synced {} ({} -> {}, replaced={}, rapid_fire={})",
            game.action_id(),
            combo,
            emit,
            replaced,
            rapid_fire
        );
        state.active.insert(
            game,
            ActiveRemap {
                combo,
                replaced,
                rapid_fire,
            },
        );

        if game == GameKeybind::Action {
            self.apply_blockers(&mut state);
        }
    }

    /// Block the `game.action` combo while any blocker is registered.
    fn apply_blockers(&self, state: &mut SyncState) {
        let should_block = !state.blockers.is_empty();
        let desired: HashSet<String> = if should_block {
            state
                .active
                .get(&GameKeybind::Action)
                .map(|a| a.combo.clone())
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        for combo in state.blocked_combos.difference(&desired) {
            if let Err(e) = self.remapper.unblock(combo) {
                log::debug!("unblock {} failed: {}", combo, e);
            }
        }
        for combo in desired.difference(&state.blocked_combos) {
            if let Err(e) = self.remapper.block(combo) {
                log::debug!("block {} failed: {}", combo, e);
            }
        }
        state.blocked_combos = desired;
    }
}

/// Keeps the native remapper in line with the `game.*` keybinds.
#[derive(Clone)]
pub struct GameKeybindSync {
    inner: Arc<SyncInner>,
}

impl std::fmt::Debug for GameKeybindSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameKeybindSync").finish_non_exhaustive()
    }
}

impl GameKeybindSync {
    pub fn new(engine: KeybindEngine, remapper: Arc<dyn NativeKeyRemapper>) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                engine,
                remapper,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// Reconcile one game action. Idempotent.
    pub fn sync(&self, game: GameKeybind) {
        self.inner.sync(game);
    }

    /// Sync every game action and keep them synced on keybind or hold changes.
    /// Later calls are no-ops.
    pub fn install_once(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.installed {
                return;
            }
            state.installed = true;
        }

        let mut subscriptions = Vec::with_capacity(GameKeybind::ALL.len() * 2);
        for game in GameKeybind::ALL {
            self.inner.sync(game);

            let weak: Weak<SyncInner> = Arc::downgrade(&self.inner);
            subscriptions.push(self.inner.engine.on_keybind_change(game.action_id(), move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.sync(game);
                }
            }));
            let weak: Weak<SyncInner> = Arc::downgrade(&self.inner);
            subscriptions.push(self.inner.engine.on_hold_detection_change(
                game.action_id(),
                move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.sync(game);
                    }
                },
            ));
        }
        self.inner.state.lock().subscriptions = subscriptions;
        log::info!("Game keybind sync installed");
    }

    /// Register or clear a reason to block the native `game.action` key.
    ///
    /// The key stays blocked while at least one source is blocking. Empty
    /// source names are ignored.
    pub fn set_game_action_blocked(&self, source: &str, blocked: bool) {
        if source.is_empty() {
            return;
        }
        let mut state = self.inner.state.lock();
        if blocked {
            state.blockers.insert(source.to_string());
        } else {
            state.blockers.remove(source);
        }
        self.inner.apply_blockers(&mut state);
    }

    /// Whether a game action currently has an active remap installed.
    pub fn is_remapped(&self, game: GameKeybind) -> bool {
        self.inner
            .state
            .lock()
            .active
            .get(&game)
            .is_some_and(|a| a.replaced)
    }
}

impl Drop for SyncInner {
    fn drop(&mut self) {
        for subscription in self.state.get_mut().subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}
