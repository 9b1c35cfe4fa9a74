//! Hotkey value type and string codec.
//!
//! A hotkey is a physical key code (the DOM `KeyboardEvent.code` name, e.g.
//! `KeyX`, `Space`, `AltLeft`) plus modifier flags. The persisted form is
//! `"Ctrl+Alt+Shift+Meta+Code"` with modifiers in that fixed order, so
//! `hotkey -> string -> hotkey` is exact.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for hotkey parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyParseError {
    #[error("empty hotkey string")]
    Empty,
    #[error("hotkey ends with a modifier, no key specified")]
    MissingKey,
    #[error("multiple keys specified: '{0}'")]
    MultipleKeys(String),
    #[error("unknown key code: '{0}'")]
    UnknownCode(String),
}

/// Set of active modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }
}

/// Which modifier a modifier key code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKind {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl ModifierKind {
    /// The modifier a physical code represents, if any.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ControlLeft" | "ControlRight" => Some(Self::Ctrl),
            "AltLeft" | "AltRight" => Some(Self::Alt),
            "ShiftLeft" | "ShiftRight" => Some(Self::Shift),
            "MetaLeft" | "MetaRight" => Some(Self::Meta),
            _ => None,
        }
    }
}

/// A physical key plus modifiers.
///
/// Equality is structural: same code and same modifier set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    code: String,
}

impl Hotkey {
    /// Build a hotkey from a key code, canonicalizing its spelling.
    pub fn new(modifiers: Modifiers, code: &str) -> Result<Self, HotkeyParseError> {
        let code = canonical_code(code).ok_or_else(|| HotkeyParseError::UnknownCode(code.to_string()))?;
        Ok(Self { modifiers, code })
    }

    /// Hotkey with no modifiers.
    pub fn plain(code: &str) -> Result<Self, HotkeyParseError> {
        Self::new(Modifiers::NONE, code)
    }

    /// The canonical physical key code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// True when the trigger key is itself a modifier (e.g. `Alt+AltLeft`).
    pub fn is_modifier_only(&self) -> bool {
        ModifierKind::from_code(&self.code).is_some()
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        if self.modifiers.meta {
            f.write_str("Meta+")?;
        }
        f.write_str(&self.code)
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hotkey(s)
    }
}

/// Serialize a hotkey to its persisted string form.
pub fn hotkey_to_string(hotkey: &Hotkey) -> String {
    hotkey.to_string()
}

/// Parse a persisted hotkey string.
///
/// Modifiers (case-insensitive): `Ctrl`/`Control`, `Alt`/`Option`, `Shift`,
/// `Meta`/`Cmd`/`Command`/`Super`/`Win`. The final token is the key code.
pub fn parse_hotkey(s: &str) -> Result<Hotkey, HotkeyParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(HotkeyParseError::Empty);
    }

    let parts: Vec<&str> = trimmed.split('+').map(str::trim).collect();
    let mut modifiers = Modifiers::default();
    let mut code_part: Option<&str> = None;

    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        let is_modifier = match part.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => {
                modifiers.ctrl = true;
                true
            }
            "alt" | "option" => {
                modifiers.alt = true;
                true
            }
            "shift" => {
                modifiers.shift = true;
                true
            }
            "meta" | "cmd" | "command" | "super" | "win" => {
                modifiers.meta = true;
                true
            }
            _ => false,
        };

        if is_modifier {
            if is_last {
                return Err(HotkeyParseError::MissingKey);
            }
            continue;
        }
        if code_part.is_some() {
            return Err(HotkeyParseError::MultipleKeys((*part).to_string()));
        }
        code_part = Some(part);
    }

    let code = code_part.ok_or(HotkeyParseError::MissingKey)?;
    Hotkey::new(modifiers, code)
}

/// Parse a persisted hotkey string, treating anything unparsable as "no binding".
pub fn string_to_hotkey(s: &str) -> Option<Hotkey> {
    match parse_hotkey(s) {
        Ok(hotkey) => Some(hotkey),
        Err(e) => {
            log::warn!("Ignoring unparsable hotkey '{}': {}", s, e);
            None
        }
    }
}

const NAMED_CODES: &[&str] = &[
    // Whitespace / editing
    "Space",
    "Enter",
    "Escape",
    "Tab",
    "Backspace",
    "Delete",
    "Insert",
    // Navigation
    "Home",
    "End",
    "PageUp",
    "PageDown",
    "ArrowUp",
    "ArrowDown",
    "ArrowLeft",
    "ArrowRight",
    // Punctuation by position
    "Minus",
    "Equal",
    "BracketLeft",
    "BracketRight",
    "Backslash",
    "IntlBackslash",
    "Semicolon",
    "Quote",
    "Backquote",
    "Comma",
    "Period",
    "Slash",
    // Modifiers and locks
    "ControlLeft",
    "ControlRight",
    "AltLeft",
    "AltRight",
    "ShiftLeft",
    "ShiftRight",
    "MetaLeft",
    "MetaRight",
    "CapsLock",
    "ContextMenu",
    // Numpad extras
    "NumpadAdd",
    "NumpadSubtract",
    "NumpadMultiply",
    "NumpadDivide",
    "NumpadDecimal",
    "NumpadEnter",
];

/// Canonical spelling of a physical key code, or `None` if it isn't one.
///
/// Accepts any ASCII case: `keyx`, `KEYX` and `KeyX` all resolve to `KeyX`.
pub fn canonical_code(s: &str) -> Option<String> {
    let lower = s.trim().to_ascii_lowercase();

    if let Some(rest) = lower.strip_prefix("key") {
        let mut chars = rest.chars();
        if let (Some(c), None) = (chars.next(), chars.next())
            && c.is_ascii_lowercase()
        {
            return Some(format!("Key{}", c.to_ascii_uppercase()));
        }
    }
    if let Some(rest) = lower.strip_prefix("digit")
        && rest.len() == 1
        && rest.chars().all(|c| c.is_ascii_digit())
    {
        return Some(format!("Digit{rest}"));
    }
    if let Some(rest) = lower.strip_prefix("numpad")
        && rest.len() == 1
        && rest.chars().all(|c| c.is_ascii_digit())
    {
        return Some(format!("Numpad{rest}"));
    }
    if let Some(rest) = lower.strip_prefix('f')
        && let Ok(n) = rest.parse::<u8>()
        && (1..=24).contains(&n)
        && !rest.starts_with('0')
    {
        return Some(format!("F{n}"));
    }

    NAMED_CODES
        .iter()
        .find(|code| code.eq_ignore_ascii_case(&lower))
        .map(|code| (*code).to_string())
}
