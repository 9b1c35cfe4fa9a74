//! Outgoing message interception for garden-mod.
//!
//! The game client sends every protocol message through one host send call.
//! This crate wraps that call exactly once, whenever the host shows up, and
//! runs each outgoing message through an ordered, per-type interceptor chain
//! that can observe, replace or drop it.
//!
//! Features:
//! - Lazy, idempotent installation with polling and a timeout
//! - Left-to-right fold with early `Drop`, fail-open on interceptor errors
//! - Cross-context flags through a shared-global bridge, including the
//!   one-shot token used by flows that resend what they intercepted
//! - Page WebSocket tracking and direct sends on the active game socket

pub mod bridge;
pub mod error;
pub mod hub;
pub mod interception;
pub mod interceptor;
pub mod message;
pub mod socket;
pub mod task;
pub mod wait;

pub use bridge::{ArmedToken, LocalGlobals, OneShotFlag, SharedGlobals, is_truthy, keys};
pub use error::HookError;
pub use hub::{HubConfig, InstallStatus, MessageHub, Registration};
pub use interception::{
    HostLocator, HostSlot, InterceptionPoint, MemoryConnection, RestoreHandle, RoomConnection,
    SendFn, SendSlot,
};
pub use interceptor::{InterceptContext, Interceptor, InterceptorRegistry, Outcome, Verdict};
pub use message::{ClientMessage, GameMessage};
pub use socket::{GameSocket, MemorySocket, ReadyState, SocketTracker};
pub use task::spawn_detached;
pub use wait::wait_for;
