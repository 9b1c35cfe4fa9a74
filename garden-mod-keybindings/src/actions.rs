//! Keybind action catalog.
//!
//! Static actions are grouped into sections (`gui`, `shops`, `game`, `sell`).
//! The `pets` section is dynamic: it is rebuilt from the player's team list.

use crate::hotkey::{Hotkey, string_to_hotkey};

/// Well-known action ids.
pub mod ids {
    pub const GUI_TOGGLE: &str = "gui.toggle";
    pub const GUI_DRAG: &str = "gui.drag";
    pub const SHOPS_SEEDS: &str = "shops.seeds";
    pub const SHOPS_EGGS: &str = "shops.eggs";
    pub const SHOPS_DECORS: &str = "shops.decors";
    pub const SHOPS_TOOLS: &str = "shops.tools";
    pub const GAME_ACTION: &str = "game.action";
    pub const GAME_INVENTORY: &str = "game.inventory";
    pub const GAME_MOVE_UP: &str = "game.move-up";
    pub const GAME_MOVE_DOWN: &str = "game.move-down";
    pub const GAME_MOVE_LEFT: &str = "game.move-left";
    pub const GAME_MOVE_RIGHT: &str = "game.move-right";
    pub const GAME_REMOVE_SLOT_75: &str = "game.remove-slot-75";
    pub const SELL_ALL: &str = "sell.sell-all";
    pub const SELL_ALL_PETS: &str = "sell.sell-all-pets";
    pub const PET_TEAM_PREV: &str = "pets.team.prev";
    pub const PET_TEAM_NEXT: &str = "pets.team.next";
}

pub const PET_SECTION_ID: &str = "pets";
pub const PET_TEAM_ACTION_PREFIX: &str = "pets.team.";

/// Opt-in hold detection for an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldDetection {
    pub label: String,
    pub description: Option<String>,
    pub default_enabled: bool,
}

/// A bindable action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeybindAction {
    pub id: String,
    pub section_id: String,
    pub label: String,
    pub hint: Option<String>,
    /// `None` means the action is unbound until the user opts in.
    pub default_hotkey: Option<Hotkey>,
    /// Whether a bare modifier (e.g. left Alt) may trigger this action.
    pub allow_modifier_only: bool,
    pub hold_detection: Option<HoldDetection>,
}

impl KeybindAction {
    pub fn supports_hold(&self) -> bool {
        self.hold_detection.is_some()
    }
}

/// A titled group of actions, as shown in the keybind menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeybindSection {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub actions: Vec<KeybindAction>,
}

/// A pet team as reported by the pet service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetTeamInfo {
    pub id: String,
    pub name: Option<String>,
}

impl PetTeamInfo {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }
}

/// Action id bound to "use this pet team".
pub fn pet_team_action_id(team_id: &str) -> String {
    format!("{PET_TEAM_ACTION_PREFIX}{team_id}")
}

struct ActionConfig {
    id: &'static str,
    label: &'static str,
    hint: Option<&'static str>,
    default_hotkey: Option<&'static str>,
    allow_modifier_only: bool,
    hold: Option<(&'static str, bool)>,
}

impl ActionConfig {
    const fn new(id: &'static str, label: &'static str, default_hotkey: Option<&'static str>) -> Self {
        Self {
            id,
            label,
            hint: None,
            default_hotkey,
            allow_modifier_only: false,
            hold: None,
        }
    }

    const fn hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    const fn modifier_only(mut self) -> Self {
        self.allow_modifier_only = true;
        self
    }

    const fn hold(mut self, label: &'static str, default_enabled: bool) -> Self {
        self.hold = Some((label, default_enabled));
        self
    }
}

struct SectionConfig {
    id: &'static str,
    title: &'static str,
    icon: &'static str,
    description: &'static str,
    actions: &'static [ActionConfig],
}

const SECTION_CONFIG: &[SectionConfig] = &[
    SectionConfig {
        id: "gui",
        title: "GUI",
        icon: "🖥️",
        description: "Choose how you open and move the overlay.",
        actions: &[
            ActionConfig::new(ids::GUI_TOGGLE, "👁️ Toggle menu visibility", Some("Alt+KeyX"))
                .hint("Opens or closes the mod overlay."),
            ActionConfig::new(ids::GUI_DRAG, "✋ Drag HUD", Some("Alt+AltLeft"))
                .hint("Hold to drag menus interfaces around the screen.")
                .modifier_only(),
        ],
    },
    SectionConfig {
        id: "shops",
        title: "Shops",
        icon: "🛒",
        description: "Quick shortcuts to every shop tab.",
        actions: &[
            ActionConfig::new(ids::SHOPS_SEEDS, "🌰 Seeds shop", Some("Alt+KeyS")),
            ActionConfig::new(ids::SHOPS_EGGS, "🥚 Eggs shop", Some("Alt+KeyE")),
            ActionConfig::new(ids::SHOPS_DECORS, "🪑 Decors shop", Some("Alt+KeyD")),
            ActionConfig::new(ids::SHOPS_TOOLS, "🧺 Tools shop", Some("Alt+KeyT")),
        ],
    },
    SectionConfig {
        id: "game",
        title: "Game",
        icon: "🎮",
        description: "Remap the in-game actions",
        actions: &[
            ActionConfig::new(ids::GAME_ACTION, "⚡ Action", Some("Space")).hold("Hold to repeat", false),
            ActionConfig::new(ids::GAME_INVENTORY, "🎒 Inventory", Some("KeyE")),
            ActionConfig::new(ids::GAME_MOVE_UP, "⬆ Move up", Some("KeyW")),
            ActionConfig::new(ids::GAME_MOVE_DOWN, "⬇ Move down", Some("KeyS")),
            ActionConfig::new(ids::GAME_MOVE_LEFT, "⬅ Move left", Some("KeyA")),
            ActionConfig::new(ids::GAME_MOVE_RIGHT, "➡ Move right", Some("KeyD")),
            ActionConfig::new(ids::GAME_REMOVE_SLOT_75, "🧹 Remove object under player", None)
                .hint("Removes the decor or plant on the tile you are standing on."),
        ],
    },
    SectionConfig {
        id: "sell",
        title: "Sell",
        icon: "💰",
        description: "Streamline selling actions.",
        actions: &[
            ActionConfig::new(ids::SELL_ALL, "🌾 All crops", None)
                .hint("Trigger the sell-all flow for harvested crops."),
            ActionConfig::new(ids::SELL_ALL_PETS, "🐾 All pets", None)
                .hint("Sell every non-favorited pet in your inventory."),
        ],
    },
];

fn build_action(section_id: &str, config: &ActionConfig) -> KeybindAction {
    KeybindAction {
        id: config.id.to_string(),
        section_id: section_id.to_string(),
        label: config.label.to_string(),
        hint: config.hint.map(str::to_string),
        default_hotkey: config.default_hotkey.and_then(string_to_hotkey),
        allow_modifier_only: config.allow_modifier_only,
        hold_detection: config.hold.map(|(label, default_enabled)| HoldDetection {
            label: label.to_string(),
            description: None,
            default_enabled,
        }),
    }
}

/// The fixed sections, in menu order.
pub fn static_sections() -> Vec<KeybindSection> {
    SECTION_CONFIG
        .iter()
        .map(|section| KeybindSection {
            id: section.id.to_string(),
            title: section.title.to_string(),
            description: section.description.to_string(),
            icon: section.icon.to_string(),
            actions: section
                .actions
                .iter()
                .map(|action| build_action(section.id, action))
                .collect(),
        })
        .collect()
}

fn pet_action(id: String, label: String) -> KeybindAction {
    KeybindAction {
        id,
        section_id: PET_SECTION_ID.to_string(),
        label,
        hint: None,
        default_hotkey: None,
        allow_modifier_only: false,
        hold_detection: None,
    }
}

/// Build the `pets` section for the given team list.
///
/// Always contains previous/next team actions followed by one action per
/// team, labelled with the team name or `Team N` when the name is blank.
pub fn pet_section(teams: &[PetTeamInfo]) -> KeybindSection {
    let mut actions = vec![
        pet_action(ids::PET_TEAM_PREV.to_string(), "◀️ Previous team".to_string()),
        pet_action(ids::PET_TEAM_NEXT.to_string(), "▶️ Next team".to_string()),
    ];
    for (index, team) in teams.iter().enumerate() {
        let name = team.name.as_deref().map(str::trim).unwrap_or_default();
        let label_name = if name.is_empty() {
            format!("Team {}", index + 1)
        } else {
            name.to_string()
        };
        actions.push(pet_action(
            pet_team_action_id(&team.id),
            format!("Use team: {label_name}"),
        ));
    }

    KeybindSection {
        id: PET_SECTION_ID.to_string(),
        title: "Pets".to_string(),
        description: "Assign shortcuts to your pet teams and cycle through them instantly."
            .to_string(),
        icon: "🐷".to_string(),
        actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(sections: &'a [KeybindSection], id: &str) -> &'a KeybindAction {
        sections
            .iter()
            .flat_map(|s| s.actions.iter())
            .find(|a| a.id == id)
            .unwrap()
    }

    #[test]
    fn test_static_defaults_parse() {
        let sections = static_sections();
        let toggle = find(&sections, ids::GUI_TOGGLE);
        assert_eq!(toggle.default_hotkey.as_ref().unwrap().to_string(), "Alt+KeyX");

        let drag = find(&sections, ids::GUI_DRAG);
        assert!(drag.allow_modifier_only);
        assert!(drag.default_hotkey.as_ref().unwrap().is_modifier_only());

        assert_eq!(find(&sections, ids::SELL_ALL).default_hotkey, None);
        assert_eq!(find(&sections, ids::GAME_REMOVE_SLOT_75).default_hotkey, None);
    }

    #[test]
    fn test_every_non_null_default_is_parsed() {
        for section in SECTION_CONFIG {
            for config in section.actions {
                if config.default_hotkey.is_some() {
                    assert!(
                        build_action(section.id, config).default_hotkey.is_some(),
                        "{} default failed to parse",
                        config.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_only_game_action_supports_hold() {
        let sections = static_sections();
        let holders: Vec<&str> = sections
            .iter()
            .flat_map(|s| s.actions.iter())
            .filter(|a| a.supports_hold())
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(holders, vec![ids::GAME_ACTION]);
        let hold = find(&sections, ids::GAME_ACTION).hold_detection.as_ref().unwrap();
        assert!(!hold.default_enabled);
    }

    #[test]
    fn test_pet_section_labels() {
        let section = pet_section(&[
            PetTeamInfo::new("a1", Some("Farmers")),
            PetTeamInfo::new("b2", Some("   ")),
            PetTeamInfo::new("c3", None),
        ]);
        let labels: Vec<&str> = section.actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "◀️ Previous team",
                "▶️ Next team",
                "Use team: Farmers",
                "Use team: Team 2",
                "Use team: Team 3",
            ]
        );
        assert_eq!(section.actions[2].id, "pets.team.a1");
        assert!(section.actions.iter().all(|a| a.default_hotkey.is_none()));
    }
}
