//! Error types for the hook layer.

use crate::socket::ReadyState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("host connection not found after {waited_ms} ms")]
    HostNotFound { waited_ms: u64 },

    #[error("no active game socket")]
    NoActiveSocket,

    #[error("game socket is not open (state: {0:?})")]
    SocketNotOpen(ReadyState),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket send failed: {0}")]
    Send(String),
}
