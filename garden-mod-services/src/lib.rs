//! Game services for garden-mod.
//!
//! Everything here talks to the game through collaborator traits (the
//! reactive [`AtomStore`], [`PlayerActions`], a [`Toaster`] and a
//! [`HarvestLocker`]) bundled in a [`ServiceContext`]:
//!
//! - Domain interceptors on the message hub: harvest gate, activity counters,
//!   sell-all orchestration, sale counters, hatch tracking, pet-food
//!   auto-favorite
//! - Plant catalog and garden slot helpers (seed key, size percent, mutations)
//! - Statistics recorder
//! - Bulk seed deleter
//! - Ghost movement controller

pub mod catalog;
pub mod context;
pub mod error;
pub mod garden;
pub mod ghost;
pub mod interceptors;
pub mod locker;
pub mod pets;
pub mod player;
pub mod seeds;
pub mod stats;
pub mod store;
pub mod toast;

pub use catalog::PlantCatalog;
pub use context::{ServiceContext, ServiceTimings};
pub use error::{PlayerError, StoreError};
pub use ghost::GhostController;
pub use interceptors::{DomainInterceptors, GardenMirror, install_domain_interceptors};
pub use locker::{HarvestLocker, HarvestRequest, NoLocker, ThresholdLocker};
pub use pets::{InventoryPetSnapshot, PetRarity};
pub use player::{CropInventoryDiff, MemoryPlayer, PlayerActions, PlayerCall, Position};
pub use seeds::{DeleteOptions, DeleteOutcome, DeleteProgress, SeedDeleter, SeedSelection};
pub use stats::{StatGroup, StatsRecorder, StatsSnapshot};
pub use store::{AtomKey, AtomStore, MemoryAtomStore};
pub use toast::{LogToaster, MemoryToaster, Toast, ToastLevel, Toaster};
