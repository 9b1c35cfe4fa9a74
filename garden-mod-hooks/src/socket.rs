//! Page WebSocket tracking.
//!
//! Every socket the page creates is recorded. The one carrying game traffic
//! becomes the *active* socket, identified either by its first game-state
//! message or, failing that, by still being open shortly after `open`.

use crate::bridge::{SharedGlobals, keys};
use crate::error::HookError;
use crate::message::GameMessage;
use crate::task::spawn_detached;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Delay after `open` before a still-open socket is taken as the game socket.
pub const OPEN_FALLBACK_DELAY: Duration = Duration::from_millis(800);

/// WebSocket `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// A page WebSocket.
pub trait GameSocket: Send + Sync {
    fn ready_state(&self) -> ReadyState;
    fn send_text(&self, text: &str) -> Result<(), HookError>;
}

/// In-process socket that records what it sends.
#[derive(Debug)]
pub struct MemorySocket {
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<String>>,
}

impl Default for MemorySocket {
    fn default() -> Self {
        Self {
            state: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MemorySocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open() -> Self {
        let socket = Self::new();
        socket.set_state(ReadyState::Open);
        socket
    }

    pub fn set_state(&self, state: ReadyState) {
        *self.state.lock() = state;
    }

    /// Raw frames sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Sent frames parsed as JSON; unparsable frames are skipped.
    pub fn sent_messages(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }
}

impl GameSocket for MemorySocket {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send_text(&self, text: &str) -> Result<(), HookError> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(HookError::SocketNotOpen(state));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}

struct ActiveSocket {
    socket: Arc<dyn GameSocket>,
    reason: String,
}

struct TrackerInner {
    globals: Arc<dyn SharedGlobals>,
    sockets: Mutex<Vec<Weak<dyn GameSocket>>>,
    active: Mutex<Option<ActiveSocket>>,
    open_fallback: Duration,
}

impl TrackerInner {
    fn has_active(&self) -> bool {
        self.active.lock().is_some() || self.globals.read_flag(keys::ACTIVE_SOCKET)
    }

    /// Make `socket` the active one unless an active socket is already known.
    fn set_active(&self, socket: Arc<dyn GameSocket>, reason: String) -> bool {
        let mut active = self.active.lock();
        if active.is_some() || self.globals.read_flag(keys::ACTIVE_SOCKET) {
            return false;
        }
        log::info!("Active game socket identified ({})", reason);
        self.globals
            .write(keys::ACTIVE_SOCKET, Value::String(reason.clone()));
        *active = Some(ActiveSocket { socket, reason });
        true
    }
}

/// Records page sockets and picks the active game socket.
#[derive(Clone)]
pub struct SocketTracker {
    inner: Arc<TrackerInner>,
}

impl std::fmt::Debug for SocketTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTracker")
            .field("tracked", &self.tracked_count())
            .field("active_reason", &self.active_reason())
            .finish()
    }
}

impl SocketTracker {
    pub fn new(globals: Arc<dyn SharedGlobals>) -> Self {
        Self::with_open_fallback(globals, OPEN_FALLBACK_DELAY)
    }

    pub fn with_open_fallback(globals: Arc<dyn SharedGlobals>, open_fallback: Duration) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                globals,
                sockets: Mutex::new(Vec::new()),
                active: Mutex::new(None),
                open_fallback,
            }),
        }
    }

    /// Record a newly created socket.
    pub fn track(&self, socket: &Arc<dyn GameSocket>) {
        let mut sockets = self.inner.sockets.lock();
        sockets.retain(|s| s.strong_count() > 0);
        sockets.push(Arc::downgrade(socket));
        log::debug!("Tracking page socket #{}", sockets.len());
    }

    /// Number of tracked sockets still alive.
    pub fn tracked_count(&self) -> usize {
        self.inner
            .sockets
            .lock()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// The socket fired `open`. Schedules the open fallback check.
    pub fn on_open(&self, socket: Arc<dyn GameSocket>) -> Option<JoinHandle<()>> {
        let tracker = Arc::downgrade(&self.inner);
        let delay = self.inner.open_fallback;
        spawn_detached("ws-open", async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = tracker.upgrade() else {
                return Ok(());
            };
            if !inner.has_active() && socket.ready_state() == ReadyState::Open {
                inner.set_active(socket, "open-fallback".to_string());
            }
            Ok(())
        })
    }

    /// The socket received a text frame. Returns true if it became active.
    pub fn on_message(&self, socket: &Arc<dyn GameSocket>, text: &str) -> bool {
        if self.inner.has_active() {
            return false;
        }
        let Ok(Value::Object(data)) = serde_json::from_str::<Value>(text) else {
            return false;
        };
        let reason = match data.get("type").and_then(Value::as_str) {
            Some(t @ ("Welcome" | "Config")) => format!("message:{t}"),
            _ if data.contains_key("fullState") || data.contains_key("config") => {
                "message:state".to_string()
            }
            _ => return false,
        };
        self.inner.set_active(Arc::clone(socket), reason)
    }

    pub fn active_socket(&self) -> Option<Arc<dyn GameSocket>> {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|a| Arc::clone(&a.socket))
    }

    /// Why the active socket was chosen (`open-fallback`, `message:Welcome`, ...).
    pub fn active_reason(&self) -> Option<String> {
        self.inner.active.lock().as_ref().map(|a| a.reason.clone())
    }

    /// Serialize `message` and send it through the active socket.
    pub fn send_to_game(&self, message: &GameMessage) -> Result<(), HookError> {
        let socket = self.active_socket().ok_or(HookError::NoActiveSocket)?;
        let state = socket.ready_state();
        if state != ReadyState::Open {
            return Err(HookError::SocketNotOpen(state));
        }
        socket.send_text(&message.to_json()?)
    }
}
