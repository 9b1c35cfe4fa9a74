//! Storage and settings for garden-mod.
//!
//! This crate provides the durable key-value surface the rest of the mod
//! persists into, plus typed accessors for the handful of mod settings.
//! It includes:
//!
//! - The [`KeyValueStore`] trait with in-memory and JSON file backends
//! - External change notifications (another tab or process wrote a key)
//! - [`ModSettings`] for sell blocking, pet-food protection and ghost speed
//! - Species name normalization shared by settings and game services

pub mod error;
pub mod file_store;
pub mod settings;
pub mod species;
pub mod store;
#[cfg(feature = "watcher")]
pub mod watcher;

pub use error::StorageError;
pub use file_store::JsonFileStore;
pub use settings::ModSettings;
pub use species::normalize_species_key;
pub use store::{KeyValueStore, MemoryStore, StorageChange};
