//! Keybind engine: resolution, persistence and change notification.
//!
//! One engine instance owns the action catalog, the resolved-hotkey cache and
//! the listener tables. Bindings are persisted per action under
//! `qws:keybind:<id>` (hotkey string, or `__none__` for an explicit unbind)
//! and hold-detection flags under `qws:keybind-hold:<id>` (`"1"`/`"0"`).
//!
//! Listeners are always invoked after the engine lock is released, so a
//! listener may freely call back into the engine.

use crate::actions::{
    KeybindAction, KeybindSection, PET_SECTION_ID, PetTeamInfo, pet_section, static_sections,
};
use crate::display::pretty_hotkey;
use crate::hotkey::{Hotkey, string_to_hotkey};
use crate::matcher::{KeyEvent, matches_hotkey};
use garden_mod_config::{KeyValueStore, StorageChange};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Weak};

pub const KEYBIND_STORAGE_PREFIX: &str = "qws:keybind:";
pub const HOLD_STORAGE_PREFIX: &str = "qws:keybind-hold:";
/// Persisted marker for "explicitly unbound".
pub const STORED_NONE: &str = "__none__";

type HotkeyListener = Arc<dyn Fn(Option<&Hotkey>) + Send + Sync>;
type HoldListener = Arc<dyn Fn(bool) + Send + Sync>;

enum Notification {
    Hotkey(Vec<HotkeyListener>, Option<Hotkey>),
    Hold(Vec<HoldListener>, bool),
}

fn fire(notifications: Vec<Notification>) {
    for notification in notifications {
        match notification {
            Notification::Hotkey(listeners, hotkey) => {
                for listener in listeners {
                    listener(hotkey.as_ref());
                }
            }
            Notification::Hold(listeners, enabled) => {
                for listener in listeners {
                    listener(enabled);
                }
            }
        }
    }
}

#[derive(Default)]
struct State {
    sections: Vec<KeybindSection>,
    cache: HashMap<String, Option<Hotkey>>,
    hold_cache: HashMap<String, bool>,
    listeners: HashMap<String, Vec<(u64, HotkeyListener)>>,
    hold_listeners: HashMap<String, Vec<(u64, HoldListener)>>,
    next_listener_id: u64,
    primed: bool,
}

impl State {
    fn action(&self, id: &str) -> Option<&KeybindAction> {
        self.sections
            .iter()
            .flat_map(|s| s.actions.iter())
            .find(|a| a.id == id)
    }

    fn action_ids(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|s| s.actions.iter())
            .map(|a| a.id.clone())
            .collect()
    }

    fn hotkey_notification(&self, id: &str, hotkey: Option<Hotkey>) -> Option<Notification> {
        let listeners = self.listeners.get(id)?;
        if listeners.is_empty() {
            return None;
        }
        Some(Notification::Hotkey(
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            hotkey,
        ))
    }

    fn hold_notification(&self, id: &str, enabled: bool) -> Option<Notification> {
        let listeners = self.hold_listeners.get(id)?;
        if listeners.is_empty() {
            return None;
        }
        Some(Notification::Hold(
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            enabled,
        ))
    }

    fn next_listener_id(&mut self) -> u64 {
        self.next_listener_id += 1;
        self.next_listener_id
    }
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
    external: Mutex<Receiver<StorageChange>>,
}

impl Inner {
    fn read_stored(&self, id: &str) -> Option<Option<Hotkey>> {
        let key = format!("{KEYBIND_STORAGE_PREFIX}{id}");
        match self.store.get(&key) {
            Ok(Some(raw)) if raw == STORED_NONE => Some(None),
            Ok(Some(raw)) => Some(string_to_hotkey(&raw)),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read keybind {}: {}", id, e);
                None
            }
        }
    }

    fn write_stored(&self, id: &str, hotkey: Option<&Hotkey>) {
        let key = format!("{KEYBIND_STORAGE_PREFIX}{id}");
        let value = hotkey.map_or_else(|| STORED_NONE.to_string(), Hotkey::to_string);
        if let Err(e) = self.store.set(&key, &value) {
            log::warn!("Keybind {} not persisted: {}", id, e);
        }
    }

    fn remove_stored(&self, id: &str) {
        let key = format!("{KEYBIND_STORAGE_PREFIX}{id}");
        if let Err(e) = self.store.remove(&key) {
            log::warn!("Failed to clear persisted keybind {}: {}", id, e);
        }
    }

    fn read_hold_stored(&self, id: &str) -> Option<bool> {
        let key = format!("{HOLD_STORAGE_PREFIX}{id}");
        match self.store.get(&key) {
            Ok(value) => value.map(|raw| raw == "1"),
            Err(e) => {
                log::warn!("Failed to read hold flag {}: {}", id, e);
                None
            }
        }
    }

    fn write_hold_stored(&self, id: &str, enabled: bool) {
        let key = format!("{HOLD_STORAGE_PREFIX}{id}");
        if let Err(e) = self.store.set(&key, if enabled { "1" } else { "0" }) {
            log::warn!("Hold flag {} not persisted: {}", id, e);
        }
    }

    /// Resolve an action's hotkey through the cache. Unknown ids resolve to
    /// `None` and are not cached.
    fn ensure_cache(&self, state: &mut State, id: &str) -> Option<Hotkey> {
        if let Some(cached) = state.cache.get(id) {
            return cached.clone();
        }
        let default = state.action(id)?.default_hotkey.clone();
        let resolved = self.read_stored(id).unwrap_or(default);
        state.cache.insert(id.to_string(), resolved.clone());
        resolved
    }

    /// Resolve an action's hold flag. Actions without hold support are always `false`.
    fn ensure_hold_cache(&self, state: &mut State, id: &str) -> bool {
        let Some(default) = state
            .action(id)
            .and_then(|a| a.hold_detection.as_ref())
            .map(|h| h.default_enabled)
        else {
            return false;
        };
        if let Some(cached) = state.hold_cache.get(id) {
            return *cached;
        }
        let resolved = self.read_hold_stored(id).unwrap_or(default);
        state.hold_cache.insert(id.to_string(), resolved);
        resolved
    }

    fn remove_listener(&self, kind: ListenerKind, id: &str, token: u64) {
        let mut state = self.state.lock();
        match kind {
            ListenerKind::Hotkey => {
                if let Some(list) = state.listeners.get_mut(id) {
                    list.retain(|(t, _)| *t != token);
                    if list.is_empty() {
                        state.listeners.remove(id);
                    }
                }
            }
            ListenerKind::Hold => {
                if let Some(list) = state.hold_listeners.get_mut(id) {
                    list.retain(|(t, _)| *t != token);
                    if list.is_empty() {
                        state.hold_listeners.remove(id);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Hotkey,
    Hold,
}

/// Handle returned by the `on_*_change` registrations.
///
/// Dropping the handle keeps the listener registered; call
/// [`KeybindSubscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct KeybindSubscription {
    engine: Weak<Inner>,
    kind: ListenerKind,
    id: String,
    token: u64,
}

impl KeybindSubscription {
    fn inert(id: &str) -> Self {
        Self {
            engine: Weak::new(),
            kind: ListenerKind::Hold,
            id: id.to_string(),
            token: 0,
        }
    }

    /// The action this subscription listens to.
    pub fn action_id(&self) -> &str {
        &self.id
    }

    /// Remove the listener. A no-op if the engine or the action is gone.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.engine.upgrade() {
            inner.remove_listener(self.kind, &self.id, self.token);
        }
    }
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeybindEngine").finish_non_exhaustive()
    }
}

/// Keybind engine handle. Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct KeybindEngine {
    inner: Arc<Inner>,
}

impl KeybindEngine {
    /// Create an engine over `store` with the static sections and an empty pet section.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let external = store.subscribe();
        let mut sections = static_sections();
        sections.push(pet_section(&[]));
        Self {
            inner: Arc::new(Inner {
                store,
                state: Mutex::new(State {
                    sections,
                    ..State::default()
                }),
                external: Mutex::new(external),
            }),
        }
    }

    /// Snapshot of every section, pets last.
    pub fn sections(&self) -> Vec<KeybindSection> {
        self.inner.state.lock().sections.clone()
    }

    /// Every action id in menu order.
    pub fn action_ids(&self) -> Vec<String> {
        self.inner.state.lock().action_ids()
    }

    pub fn action(&self, id: &str) -> Option<KeybindAction> {
        self.inner.state.lock().action(id).cloned()
    }

    pub fn default_keybind(&self, id: &str) -> Option<Hotkey> {
        self.inner
            .state
            .lock()
            .action(id)
            .and_then(|a| a.default_hotkey.clone())
    }

    /// Current binding for `id`: cached, else persisted, else the default.
    pub fn get_keybind(&self, id: &str) -> Option<Hotkey> {
        let mut state = self.inner.state.lock();
        self.inner.ensure_cache(&mut state, id)
    }

    /// Bind `id` to `hotkey` (or unbind with `None`).
    ///
    /// Any other action currently resolving to the same combo is unbound
    /// first. Returns the ids of the actions that lost their binding.
    /// Unknown ids and modifier-only combos on actions that do not allow them
    /// are ignored.
    pub fn set_keybind(&self, id: &str, hotkey: Option<Hotkey>) -> Vec<String> {
        let mut dislodged = Vec::new();
        let notifications = {
            let mut state = self.inner.state.lock();
            let Some(action) = state.action(id) else {
                log::debug!("Ignoring keybind for unknown action {}", id);
                return dislodged;
            };
            if let Some(hk) = &hotkey
                && hk.is_modifier_only()
                && !action.allow_modifier_only
            {
                log::warn!("Action {} does not accept modifier-only hotkey {}", id, hk);
                return dislodged;
            }

            let current = self.inner.ensure_cache(&mut state, id);
            if current == hotkey {
                return dislodged;
            }

            let mut notifications = Vec::new();
            if let Some(next) = &hotkey {
                for other_id in state.action_ids() {
                    if other_id == id {
                        continue;
                    }
                    if self.inner.ensure_cache(&mut state, &other_id).as_ref() != Some(next) {
                        continue;
                    }
                    log::info!("Unbinding {} from {} (now used by {})", next, other_id, id);
                    state.cache.insert(other_id.clone(), None);
                    self.inner.write_stored(&other_id, None);
                    notifications.extend(state.hotkey_notification(&other_id, None));
                    dislodged.push(other_id);
                }
            }

            state.cache.insert(id.to_string(), hotkey.clone());
            self.inner.write_stored(id, hotkey.as_ref());
            notifications.extend(state.hotkey_notification(id, hotkey));
            notifications
        };
        fire(notifications);
        dislodged
    }

    /// Drop the user's binding for `id`, restoring its default.
    pub fn reset_keybind(&self, id: &str) {
        let notifications = {
            let mut state = self.inner.state.lock();
            if state.action(id).is_none() {
                return;
            }
            state.cache.remove(id);
            self.inner.remove_stored(id);
            let current = self.inner.ensure_cache(&mut state, id);
            state.hotkey_notification(id, current)
        };
        fire(notifications.into_iter().collect());
    }

    /// Whether hold detection is enabled for `id` (always `false` if unsupported).
    pub fn keybind_hold_detection(&self, id: &str) -> bool {
        let mut state = self.inner.state.lock();
        self.inner.ensure_hold_cache(&mut state, id)
    }

    /// Enable or disable hold detection. Ignored for actions without hold support.
    pub fn set_keybind_hold_detection(&self, id: &str, enabled: bool) {
        let notifications = {
            let mut state = self.inner.state.lock();
            if !state.action(id).is_some_and(KeybindAction::supports_hold) {
                return;
            }
            if self.inner.ensure_hold_cache(&mut state, id) == enabled {
                return;
            }
            state.hold_cache.insert(id.to_string(), enabled);
            self.inner.write_hold_stored(id, enabled);
            state.hold_notification(id, enabled)
        };
        fire(notifications.into_iter().collect());
    }

    /// Listen for binding changes on `id`.
    pub fn on_keybind_change<F>(&self, id: &str, callback: F) -> KeybindSubscription
    where
        F: Fn(Option<&Hotkey>) + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock();
        let token = state.next_listener_id();
        state
            .listeners
            .entry(id.to_string())
            .or_default()
            .push((token, Arc::new(callback)));
        KeybindSubscription {
            engine: Arc::downgrade(&self.inner),
            kind: ListenerKind::Hotkey,
            id: id.to_string(),
            token,
        }
    }

    /// Listen for hold-detection changes on `id`.
    ///
    /// Returns an inert subscription for actions without hold support.
    pub fn on_hold_detection_change<F>(&self, id: &str, callback: F) -> KeybindSubscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock();
        if !state.action(id).is_some_and(KeybindAction::supports_hold) {
            return KeybindSubscription::inert(id);
        }
        let token = state.next_listener_id();
        state
            .hold_listeners
            .entry(id.to_string())
            .or_default()
            .push((token, Arc::new(callback)));
        KeybindSubscription {
            engine: Arc::downgrade(&self.inner),
            kind: ListenerKind::Hold,
            id: id.to_string(),
            token,
        }
    }

    /// Resolve every action once so lookups during play never touch storage.
    pub fn prime_cache(&self) {
        let mut state = self.inner.state.lock();
        if state.primed {
            return;
        }
        state.primed = true;
        for id in state.action_ids() {
            self.inner.ensure_cache(&mut state, &id);
        }
        log::debug!("Keybind cache primed ({} actions)", state.cache.len());
    }

    /// Rebuild the pet section for a new team list.
    ///
    /// Every previous pet action is torn down (cached hotkey, hold flag and
    /// listeners) before the new ones are added. Persisted bindings survive,
    /// so a team that reappears gets its binding back.
    pub fn update_pet_keybinds(&self, teams: &[PetTeamInfo]) {
        let mut state = self.inner.state.lock();
        let old_ids: Vec<String> = state
            .sections
            .iter()
            .filter(|s| s.id == PET_SECTION_ID)
            .flat_map(|s| s.actions.iter().map(|a| a.id.clone()))
            .collect();
        for id in &old_ids {
            state.cache.remove(id);
            state.hold_cache.remove(id);
            state.listeners.remove(id);
            state.hold_listeners.remove(id);
        }

        let section = pet_section(teams);
        match state.sections.iter_mut().find(|s| s.id == PET_SECTION_ID) {
            Some(existing) => *existing = section,
            None => state.sections.push(section),
        }
        log::debug!("Pet keybinds rebuilt for {} teams", teams.len());
    }

    /// Pretty label of the current binding (`—` when unbound).
    pub fn keybind_label(&self, id: &str) -> String {
        pretty_hotkey(self.get_keybind(id).as_ref())
    }

    /// True if `event` triggers the current binding of `id`.
    pub fn event_matches_keybind(&self, id: &str, event: &KeyEvent) -> bool {
        self.get_keybind(id)
            .is_some_and(|hk| matches_hotkey(event, &hk))
    }

    /// Apply pending external storage changes (another tab or process).
    ///
    /// Each changed binding or hold flag is evicted from the cache, re-read
    /// and replayed to its listeners. Returns how many changes were applied.
    pub fn sync_external_changes(&self) -> usize {
        let changes: Vec<StorageChange> = self.inner.external.lock().try_iter().collect();
        let mut applied = 0;
        for change in changes {
            let notification = {
                let mut state = self.inner.state.lock();
                if let Some(id) = change.key.strip_prefix(HOLD_STORAGE_PREFIX) {
                    if !state.action(id).is_some_and(KeybindAction::supports_hold) {
                        continue;
                    }
                    state.hold_cache.remove(id);
                    let enabled = self.inner.ensure_hold_cache(&mut state, id);
                    state.hold_notification(id, enabled)
                } else if let Some(id) = change.key.strip_prefix(KEYBIND_STORAGE_PREFIX) {
                    if state.action(id).is_none() {
                        continue;
                    }
                    state.cache.remove(id);
                    let hotkey = self.inner.ensure_cache(&mut state, id);
                    state.hotkey_notification(id, hotkey)
                } else {
                    continue;
                }
            };
            log::debug!("Applied external keybind change: {}", change.key);
            applied += 1;
            fire(notification.into_iter().collect());
        }
        applied
    }
}
