//! Error types for the game collaborators.

use crate::store::AtomKey;
use thiserror::Error;

/// Reactive store failures. Callers treat these as "unknown / empty".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("atom {0} is not available")]
    Unavailable(AtomKey),

    #[error("atom {atom} rejected the read: {reason}")]
    Rejected { atom: AtomKey, reason: String },

    #[error("store connection closed")]
    Closed,
}

/// Player action failures.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player service not ready")]
    NotReady,

    #[error("{action} failed: {reason}")]
    Failed { action: &'static str, reason: String },

    #[error(transparent)]
    Hook(#[from] garden_mod_hooks::HookError),
}
