// Library root for garden-mod.
//
// # Mutex Usage Policy
//
// garden-mod state is touched from synchronous send wrappers, key handlers and
// detached tokio tasks. New code should follow these rules:
//
//   - `parking_lot::Mutex`    : default for shared state. Never hold one
//                               across an `.await`, and never call user
//                               callbacks (interceptors, listeners, toasters)
//                               while holding it.
//
//   - `tokio::sync` channels  : for anything a task waits on (inventory diffs,
//                               atom feeds, UI commands).
//
//   - `std::sync::Mutex`      : only in tests, for process-wide captures such
//                               as the test logger.

/// Library version, reported in the debug log header and by embedders.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod debug;
pub mod runtime;

pub use garden_mod_config as config;
pub use garden_mod_hooks as hooks;
pub use garden_mod_keybindings as keybindings;
pub use garden_mod_services as services;

pub use runtime::{
    ActionRoute, ModRuntime, RuntimeParts, ShopTab, UiCommand, remove_object_message,
    remove_object_under_player,
};
