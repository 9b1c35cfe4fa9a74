//! Keybinding system for garden-mod.
//!
//! Maps stable action ids (`gui.toggle`, `game.move-up`, `pets.team.<id>`)
//! to user-configurable physical hotkeys.
//!
//! Features:
//! - Hotkeys keyed by DOM physical codes, so bindings are layout independent
//! - Exact `hotkey -> string -> hotkey` persistence, failing soft on bad data
//! - One combo, one action: binding a taken combo unbinds the previous owner
//! - Hold detection and first-match-wins dispatch of down / hold / up phases
//! - Cross-tab sync of bindings through the storage change feed
//! - Reconciliation with the game's native key remapper

pub mod actions;
pub mod dispatch;
pub mod display;
pub mod engine;
pub mod game_sync;
pub mod hotkey;
pub mod matcher;

pub use actions::{
    HoldDetection, KeybindAction, KeybindSection, PetTeamInfo, ids, pet_team_action_id,
};
pub use dispatch::{DispatchOptions, KeyDispatcher, KeyPhase, KeybindDispatch};
pub use display::{code_to_display, pretty_hotkey};
pub use engine::{KeybindEngine, KeybindSubscription};
pub use game_sync::{
    GameKeybind, GameKeybindSync, MemoryKeyRemapper, NativeKeyRemapper, RapidFire, RapidFireMode,
    RemapError,
};
pub use hotkey::{
    Hotkey, HotkeyParseError, ModifierKind, Modifiers, hotkey_to_string, parse_hotkey,
    string_to_hotkey,
};
pub use matcher::{KeyEvent, KeyTarget, matches_hotkey};
