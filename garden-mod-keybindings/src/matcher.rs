//! Key event matching.
//!
//! Matches raw key events from the host page against [`Hotkey`]s by physical
//! code and exact modifier set.

use crate::hotkey::{Hotkey, ModifierKind, Modifiers};

/// What kind of element had focus when the key event fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyTarget {
    /// Game canvas, body, or any non-editable element.
    #[default]
    Other,
    /// `<input>`, `<textarea>` or a content-editable element.
    TextInput,
}

/// A keyboard event as observed by the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    /// Physical key code (`KeyW`, `Space`, `AltLeft`).
    pub code: String,
    /// Logical key value (`w`, ` `, `Alt`).
    pub key: String,
    pub modifiers: Modifiers,
    /// Native auto-repeat flag.
    pub repeat: bool,
    pub target: KeyTarget,
}

impl KeyEvent {
    /// Event for a physical code with no modifiers held.
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            key: default_key_for_code(code),
            ..Self::default()
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn in_text_input(mut self) -> Self {
        self.target = KeyTarget::TextInput;
        self
    }

    /// True if the event fired while the user was typing into a text field.
    pub fn is_typing(&self) -> bool {
        self.target == KeyTarget::TextInput
    }
}

fn default_key_for_code(code: &str) -> String {
    if let Some(letter) = code.strip_prefix("Key") {
        return letter.to_ascii_lowercase();
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        return digit.to_string();
    }
    match code {
        "Space" => " ".to_string(),
        "AltLeft" | "AltRight" => "Alt".to_string(),
        "ControlLeft" | "ControlRight" => "Control".to_string(),
        "ShiftLeft" | "ShiftRight" => "Shift".to_string(),
        "MetaLeft" | "MetaRight" => "Meta".to_string(),
        other => other.to_string(),
    }
}

/// Check whether `event` triggers `hotkey`.
///
/// The physical code must match and every modifier flag must be equal. For
/// modifier-only hotkeys the flag belonging to the trigger key itself is not
/// compared: it reads `true` on key-down and `false` on key-up of that key.
pub fn matches_hotkey(event: &KeyEvent, hotkey: &Hotkey) -> bool {
    if !event.code.eq_ignore_ascii_case(hotkey.code()) {
        return false;
    }

    let want = hotkey.modifiers;
    let have = event.modifiers;
    let ignore = ModifierKind::from_code(hotkey.code());

    let same = |kind: ModifierKind, a: bool, b: bool| ignore == Some(kind) || a == b;

    same(ModifierKind::Ctrl, want.ctrl, have.ctrl)
        && same(ModifierKind::Alt, want.alt, have.alt)
        && same(ModifierKind::Shift, want.shift, have.shift)
        && same(ModifierKind::Meta, want.meta, have.meta)
}
