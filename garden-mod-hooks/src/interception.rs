//! Host send-call surface and the interception point that wraps it.
//!
//! The game's room connection exposes `sendMessage(message, ...args)` either
//! as a static function or as a prototype method, and it may only appear
//! some time after page load. [`HostLocator`] finds the connection;
//! [`InterceptionPoint`] swaps its send function for a wrapper and hands
//! back a [`RestoreHandle`].

use crate::message::GameMessage;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A send function: `(message, extra args)`.
pub type SendFn = Arc<dyn Fn(GameMessage, &[Value]) + Send + Sync>;

/// Where a connection keeps its send function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendSlot {
    /// `Connection.sendMessage`
    Static,
    /// `Connection.prototype.sendMessage`
    Prototype,
}

/// The host's room connection object.
pub trait RoomConnection: Send + Sync {
    /// The function currently installed at `slot`.
    fn send_fn(&self, slot: SendSlot) -> Option<SendFn>;
    /// Install `send` at `slot`.
    fn set_send_fn(&self, slot: SendSlot, send: SendFn);
}

/// Finds the host's room connection, which may not exist yet.
pub trait HostLocator: Send + Sync {
    fn locate(&self) -> Option<Arc<dyn RoomConnection>>;
}

impl<F> HostLocator for F
where
    F: Fn() -> Option<Arc<dyn RoomConnection>> + Send + Sync,
{
    fn locate(&self) -> Option<Arc<dyn RoomConnection>> {
        self()
    }
}

/// A locator the embedder fills in once the connection shows up.
#[derive(Default)]
pub struct HostSlot {
    connection: Mutex<Option<Arc<dyn RoomConnection>>>,
}

impl std::fmt::Debug for HostSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSlot")
            .field("present", &self.connection.lock().is_some())
            .finish()
    }
}

impl HostSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, connection: Arc<dyn RoomConnection>) {
        *self.connection.lock() = Some(connection);
    }

    pub fn clear(&self) {
        *self.connection.lock() = None;
    }
}

impl HostLocator for HostSlot {
    fn locate(&self) -> Option<Arc<dyn RoomConnection>> {
        self.connection.lock().clone()
    }
}

/// A resolved send function that can be wrapped.
pub struct InterceptionPoint {
    connection: Arc<dyn RoomConnection>,
    slot: SendSlot,
    original: SendFn,
}

impl std::fmt::Debug for InterceptionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionPoint")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl InterceptionPoint {
    /// Find the send function: the static slot first, then the prototype slot.
    pub fn resolve(connection: Arc<dyn RoomConnection>) -> Option<Self> {
        [SendSlot::Static, SendSlot::Prototype]
            .into_iter()
            .find_map(|slot| {
                connection.send_fn(slot).map(|original| (slot, original))
            })
            .map(|(slot, original)| Self {
                connection,
                slot,
                original,
            })
    }

    pub fn slot(&self) -> SendSlot {
        self.slot
    }

    /// The unwrapped send function.
    pub fn original(&self) -> SendFn {
        Arc::clone(&self.original)
    }

    /// Build a wrapper around the original and install it.
    ///
    /// Returns the installed wrapper and a handle that reinstalls the original.
    pub fn wrap<W>(self, make_wrapper: W) -> (SendFn, RestoreHandle)
    where
        W: FnOnce(SendFn) -> SendFn,
    {
        let wrapped = make_wrapper(Arc::clone(&self.original));
        self.connection.set_send_fn(self.slot, Arc::clone(&wrapped));
        (
            wrapped,
            RestoreHandle {
                connection: self.connection,
                slot: self.slot,
                original: self.original,
            },
        )
    }
}

/// Puts an intercepted send function back.
pub struct RestoreHandle {
    connection: Arc<dyn RoomConnection>,
    slot: SendSlot,
    original: SendFn,
}

impl std::fmt::Debug for RestoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreHandle")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl RestoreHandle {
    pub fn restore(self) {
        self.connection.set_send_fn(self.slot, self.original);
    }
}

/// In-process room connection.
///
/// Stands in for the host object when embedding without a page, and in
/// tests. [`MemoryConnection::send`] behaves like the game calling
/// `sendMessage`: it invokes whatever is installed, static slot first.
#[derive(Default)]
pub struct MemoryConnection {
    slots: Mutex<HashMap<SendSlot, SendFn>>,
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots: Vec<SendSlot> = self.slots.lock().keys().copied().collect();
        f.debug_struct("MemoryConnection")
            .field("slots", &slots)
            .finish()
    }
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection whose send function lives at `slot`.
    pub fn with_send(slot: SendSlot, send: SendFn) -> Self {
        let connection = Self::new();
        connection.set_send_fn(slot, send);
        connection
    }

    /// Call the installed send function. Returns `false` if there is none.
    pub fn send(&self, message: GameMessage, args: &[Value]) -> bool {
        let send = {
            let slots = self.slots.lock();
            slots
                .get(&SendSlot::Static)
                .or_else(|| slots.get(&SendSlot::Prototype))
                .cloned()
        };
        match send {
            Some(send) => {
                send(message, args);
                true
            }
            None => false,
        }
    }
}

impl RoomConnection for MemoryConnection {
    fn send_fn(&self, slot: SendSlot) -> Option<SendFn> {
        self.slots.lock().get(&slot).cloned()
    }

    fn set_send_fn(&self, slot: SendSlot, send: SendFn) {
        self.slots.lock().insert(slot, send);
    }
}
