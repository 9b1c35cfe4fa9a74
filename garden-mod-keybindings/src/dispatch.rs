//! Global key dispatch.
//!
//! The host feeds every capturing `keydown`/`keyup` into a [`KeyDispatcher`],
//! which resolves at most one action per event (first match in action order)
//! and classifies the phase as down, hold or up.

use crate::engine::KeybindEngine;
use crate::matcher::{KeyEvent, matches_hotkey};
use std::collections::HashSet;
use std::sync::Arc;

/// Phase of a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPhase {
    Down,
    /// Repeated down while held; only for actions with hold detection enabled.
    Hold,
    Up,
}

/// An action triggered by a key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeybindDispatch {
    pub action_id: String,
    pub phase: KeyPhase,
    /// Whether the host should `preventDefault()` + `stopPropagation()` the event.
    pub prevent_default: bool,
}

pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Dispatcher configuration.
#[derive(Clone)]
pub struct DispatchOptions {
    /// True while the keybind menu is recording a new binding.
    pub is_rebinding: Option<Predicate>,
    /// False while gameplay input should be ignored (e.g. window unfocused).
    pub can_use_gameplay_input: Option<Predicate>,
    pub prevent_default: bool,
    /// Actions to consider, in priority order. Empty means every action the
    /// engine knows about at the time of the event.
    pub action_ids: Vec<String>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            is_rebinding: None,
            can_use_gameplay_input: None,
            prevent_default: true,
            action_ids: Vec::new(),
        }
    }
}

impl std::fmt::Debug for DispatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchOptions")
            .field("prevent_default", &self.prevent_default)
            .field("action_ids", &self.action_ids)
            .finish_non_exhaustive()
    }
}

/// Stateful key-event dispatcher.
#[derive(Debug)]
pub struct KeyDispatcher {
    engine: KeybindEngine,
    options: DispatchOptions,
    pressed: HashSet<String>,
}

impl KeyDispatcher {
    pub fn new(engine: KeybindEngine, options: DispatchOptions) -> Self {
        Self {
            engine,
            options,
            pressed: HashSet::new(),
        }
    }

    /// Handle a `keydown`.
    ///
    /// A repeat (native auto-repeat, or a down while the action is already
    /// pressed) dispatches [`KeyPhase::Hold`] only when hold detection is
    /// enabled for the action; otherwise it is swallowed.
    pub fn key_down(&mut self, event: &KeyEvent) -> Option<KeybindDispatch> {
        if !self.accepts(event) {
            return None;
        }
        for id in self.candidate_ids() {
            let Some(hotkey) = self.engine.get_keybind(&id) else {
                continue;
            };
            if !matches_hotkey(event, &hotkey) {
                continue;
            }

            let phase = if self.pressed.contains(&id) || event.repeat {
                if !self.engine.keybind_hold_detection(&id) {
                    return None;
                }
                KeyPhase::Hold
            } else {
                self.pressed.insert(id.clone());
                KeyPhase::Down
            };
            return Some(self.dispatch(id, phase));
        }
        None
    }

    /// Handle a `keyup`.
    ///
    /// Every pressed action bound to the released physical key is cleared,
    /// even if modifiers changed in between. The first action that matches
    /// the event, or was pressed on this key, receives [`KeyPhase::Up`].
    pub fn key_up(&mut self, event: &KeyEvent) -> Option<KeybindDispatch> {
        if !self.accepts(event) {
            return None;
        }
        let mut result = None;
        for id in self.candidate_ids() {
            let Some(hotkey) = self.engine.get_keybind(&id) else {
                continue;
            };
            let was_pressed =
                hotkey.code().eq_ignore_ascii_case(&event.code) && self.pressed.remove(&id);
            if result.is_none() && (was_pressed || matches_hotkey(event, &hotkey)) {
                result = Some(id);
            }
        }
        result.map(|id| self.dispatch(id, KeyPhase::Up))
    }

    /// Forget every pressed key (window blur).
    pub fn blur(&mut self) {
        self.pressed.clear();
    }

    /// Page visibility changed; hiding the page clears pressed state.
    pub fn visibility_changed(&mut self, visible: bool) {
        if !visible {
            self.pressed.clear();
        }
    }

    /// True if `id` is currently held.
    pub fn is_pressed(&self, id: &str) -> bool {
        self.pressed.contains(id)
    }

    fn accepts(&self, event: &KeyEvent) -> bool {
        if self.options.is_rebinding.as_ref().is_some_and(|f| f()) {
            return false;
        }
        if self.options.can_use_gameplay_input.as_ref().is_some_and(|f| !f()) {
            return false;
        }
        !event.is_typing()
    }

    fn candidate_ids(&self) -> Vec<String> {
        if self.options.action_ids.is_empty() {
            self.engine.action_ids()
        } else {
            self.options.action_ids.clone()
        }
    }

    fn dispatch(&self, action_id: String, phase: KeyPhase) -> KeybindDispatch {
        log::trace!("Keybind {} {:?}", action_id, phase);
        KeybindDispatch {
            action_id,
            phase,
            prevent_default: self.options.prevent_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ids;
    use crate::hotkey::{Modifiers, parse_hotkey};
    use garden_mod_config::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn dispatcher() -> (KeyDispatcher, KeybindEngine) {
        let engine = KeybindEngine::new(Arc::new(MemoryStore::new()));
        (
            KeyDispatcher::new(engine.clone(), DispatchOptions::default()),
            engine,
        )
    }

    #[test]
    fn test_down_then_repeat_without_hold_is_swallowed() {
        let (mut d, _) = dispatcher();
        let ev = KeyEvent::new("KeyW");
        let first = d.key_down(&ev).unwrap();
        assert_eq!(first.action_id, ids::GAME_MOVE_UP);
        assert_eq!(first.phase, KeyPhase::Down);
        assert!(first.prevent_default);
        assert_eq!(d.key_down(&ev.clone().repeating()), None);
        assert_eq!(d.key_down(&ev), None);
    }

    #[test]
    fn test_repeat_with_hold_enabled_dispatches_hold() {
        let (mut d, engine) = dispatcher();
        engine.set_keybind_hold_detection(ids::GAME_ACTION, true);
        let ev = KeyEvent::new("Space");
        assert_eq!(d.key_down(&ev).unwrap().phase, KeyPhase::Down);
        assert_eq!(d.key_down(&ev.clone().repeating()).unwrap().phase, KeyPhase::Hold);
        assert_eq!(d.key_up(&ev).unwrap().phase, KeyPhase::Up);
        assert!(!d.is_pressed(ids::GAME_ACTION));
    }

    #[test]
    fn test_first_match_wins() {
        let (mut d, _) = dispatcher();
        // Alt+KeyE is "shops.eggs"; plain KeyE is "game.inventory".
        let ev = KeyEvent::new("KeyE").with_modifiers(Modifiers::alt());
        assert_eq!(d.key_down(&ev).unwrap().action_id, ids::SHOPS_EGGS);
        assert_eq!(
            d.key_down(&KeyEvent::new("KeyE")).unwrap().action_id,
            ids::GAME_INVENTORY
        );
    }

    #[test]
    fn test_key_up_after_modifier_released_clears_pressed() {
        let (mut d, _) = dispatcher();
        let down = KeyEvent::new("KeyX").with_modifiers(Modifiers::alt());
        d.key_down(&down).unwrap();
        assert!(d.is_pressed(ids::GUI_TOGGLE));

        let up = d.key_up(&KeyEvent::new("KeyX")).unwrap();
        assert_eq!(up.action_id, ids::GUI_TOGGLE);
        assert_eq!(up.phase, KeyPhase::Up);
        assert!(!d.is_pressed(ids::GUI_TOGGLE));
        assert_eq!(d.key_down(&down).unwrap().phase, KeyPhase::Down);
    }

    #[test]
    fn test_modifier_only_drag() {
        let (mut d, _) = dispatcher();
        let down = KeyEvent::new("AltLeft").with_modifiers(Modifiers::alt());
        assert_eq!(d.key_down(&down).unwrap().action_id, ids::GUI_DRAG);
        let up = d.key_up(&KeyEvent::new("AltLeft")).unwrap();
        assert_eq!(up.action_id, ids::GUI_DRAG);
    }

    #[test]
    fn test_typing_and_rebinding_are_ignored() {
        let rebinding = Arc::new(AtomicBool::new(false));
        let r = rebinding.clone();
        let engine = KeybindEngine::new(Arc::new(MemoryStore::new()));
        let mut d = KeyDispatcher::new(
            engine,
            DispatchOptions {
                is_rebinding: Some(Arc::new(move || r.load(Ordering::SeqCst))),
                ..DispatchOptions::default()
            },
        );

        assert_eq!(d.key_down(&KeyEvent::new("KeyW").in_text_input()), None);
        rebinding.store(true, Ordering::SeqCst);
        assert_eq!(d.key_down(&KeyEvent::new("KeyW")), None);
        rebinding.store(false, Ordering::SeqCst);
        assert!(d.key_down(&KeyEvent::new("KeyW")).is_some());
    }

    #[test]
    fn test_blur_clears_pressed() {
        let (mut d, _) = dispatcher();
        let ev = KeyEvent::new("KeyW");
        d.key_down(&ev).unwrap();
        d.blur();
        assert_eq!(d.key_down(&ev).unwrap().phase, KeyPhase::Down);
        d.visibility_changed(false);
        assert_eq!(d.key_down(&ev).unwrap().phase, KeyPhase::Down);
    }

    #[test]
    fn test_explicit_action_list_and_no_prevent_default() {
        let engine = KeybindEngine::new(Arc::new(MemoryStore::new()));
        engine.set_keybind(ids::SELL_ALL, Some(parse_hotkey("KeyP").unwrap()));
        let mut d = KeyDispatcher::new(
            engine,
            DispatchOptions {
                prevent_default: false,
                action_ids: vec![ids::SELL_ALL.to_string()],
                ..DispatchOptions::default()
            },
        );
        assert_eq!(d.key_down(&KeyEvent::new("KeyW")), None);
        let hit = d.key_down(&KeyEvent::new("KeyP")).unwrap();
        assert_eq!(hit.action_id, ids::SELL_ALL);
        assert!(!hit.prevent_default);
    }
}
