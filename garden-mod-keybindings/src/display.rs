//! Human-readable hotkey labels for menus and tooltips.

use crate::hotkey::Hotkey;

/// Label shown for an unbound action.
pub const UNBOUND_LABEL: &str = "—";

fn meta_label() -> &'static str {
    if cfg!(target_os = "macos") { "⌘" } else { "Win" }
}

/// Short display form of a physical key code (`KeyE` -> `E`, `ArrowUp` -> `↑`).
pub fn code_to_display(code: &str) -> String {
    if let Some(letter) = code.strip_prefix("Key")
        && letter.len() == 1
    {
        return letter.to_string();
    }
    if let Some(digit) = code.strip_prefix("Digit")
        && digit.len() == 1
    {
        return digit.to_string();
    }
    let label = match code {
        "ControlLeft" | "ControlRight" => "Ctrl",
        "AltLeft" | "AltRight" => "Alt",
        "ShiftLeft" | "ShiftRight" => "Shift",
        "MetaLeft" | "MetaRight" => meta_label(),
        "Escape" => "Esc",
        "Delete" => "Del",
        "Insert" => "Ins",
        "ArrowUp" => "↑",
        "ArrowDown" => "↓",
        "ArrowLeft" => "←",
        "ArrowRight" => "→",
        other => other,
    };
    label.to_string()
}

/// Pretty label such as `Ctrl + Shift + E`.
///
/// Modifiers are listed as Ctrl, Shift, Alt, Win/⌘. A modifier-only hotkey
/// shows just its modifiers so `Alt+AltLeft` reads `Alt`, not `Alt + Alt`.
pub fn pretty_hotkey(hotkey: Option<&Hotkey>) -> String {
    let Some(hotkey) = hotkey else {
        return UNBOUND_LABEL.to_string();
    };

    let mut parts: Vec<String> = Vec::with_capacity(5);
    if hotkey.modifiers.ctrl {
        parts.push("Ctrl".to_string());
    }
    if hotkey.modifiers.shift {
        parts.push("Shift".to_string());
    }
    if hotkey.modifiers.alt {
        parts.push("Alt".to_string());
    }
    if hotkey.modifiers.meta {
        parts.push(meta_label().to_string());
    }
    if !hotkey.is_modifier_only() {
        parts.push(code_to_display(hotkey.code()));
    }
    parts.join(" + ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::parse_hotkey;

    #[test]
    fn test_code_to_display() {
        assert_eq!(code_to_display("KeyE"), "E");
        assert_eq!(code_to_display("Digit5"), "5");
        assert_eq!(code_to_display("Escape"), "Esc");
        assert_eq!(code_to_display("ArrowLeft"), "←");
        assert_eq!(code_to_display("F5"), "F5");
    }

    #[test]
    fn test_pretty_orders_modifiers() {
        let hk = parse_hotkey("Ctrl+Alt+Shift+KeyE").unwrap();
        assert_eq!(pretty_hotkey(Some(&hk)), "Ctrl + Shift + Alt + E");
    }

    #[test]
    fn test_pretty_modifier_only() {
        let hk = parse_hotkey("Alt+AltLeft").unwrap();
        assert_eq!(pretty_hotkey(Some(&hk)), "Alt");
    }

    #[test]
    fn test_pretty_unbound() {
        assert_eq!(pretty_hotkey(None), UNBOUND_LABEL);
    }

    #[test]
    fn test_pretty_plain_key() {
        let hk = parse_hotkey("Space").unwrap();
        assert_eq!(pretty_hotkey(Some(&hk)), "Space");
    }
}
