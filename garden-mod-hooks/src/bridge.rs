//! Shared-global bridge.
//!
//! Isolated script contexts (page script, userscript sandbox) do not share a
//! global object, so cross-context flags go through a small key/value broker
//! instead of module state.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Well-known shared-global keys.
pub mod keys {
    /// Set once the send-call wrapper is installed in any context.
    pub const MESSAGE_HOOK_INSTALLED: &str = "__tmMessageHookInstalled";
    /// One-shot pass-through for the next `SellAllCrops`.
    pub const ALLOW_NEXT_SELL_ALL_CROPS: &str = "__tmAllowNextSellAllCrops";
    /// Set once the domain interceptors are installed.
    pub const HARVEST_HOOK_INSTALLED: &str = "__tmHarvestHookInstalled";
    /// Marks that an active game socket has been identified.
    pub const ACTIVE_SOCKET: &str = "quinoaWS";
}

/// Key/value broker shared between execution contexts.
pub trait SharedGlobals: Send + Sync {
    fn read(&self, key: &str) -> Option<Value>;
    fn write(&self, key: &str, value: Value);

    /// Truthiness of a key, with JavaScript semantics for the stored value.
    fn read_flag(&self, key: &str) -> bool {
        self.read(key).as_ref().is_some_and(is_truthy)
    }

    fn write_flag(&self, key: &str, on: bool) {
        self.write(key, Value::Bool(on));
    }
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Process-local bridge for single-context execution.
#[derive(Debug, Default)]
pub struct LocalGlobals {
    values: Mutex<HashMap<String, Value>>,
}

impl LocalGlobals {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedGlobals for LocalGlobals {
    fn read(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn write(&self, key: &str, value: Value) {
        self.values.lock().insert(key.to_string(), value);
    }
}

/// A typed one-shot token stored in a shared-global flag.
///
/// The producer [`arm`](OneShotFlag::arm)s the token before triggering work
/// that will pass back through an interceptor; the interceptor
/// [`consume`](OneShotFlag::consume)s it. The returned [`ArmedToken`] clears
/// the flag when dropped, so the token never outlives the flow that armed it.
#[derive(Clone)]
pub struct OneShotFlag {
    globals: Arc<dyn SharedGlobals>,
    key: &'static str,
}

impl std::fmt::Debug for OneShotFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneShotFlag").field("key", &self.key).finish()
    }
}

impl OneShotFlag {
    pub fn new(globals: Arc<dyn SharedGlobals>, key: &'static str) -> Self {
        Self { globals, key }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn is_armed(&self) -> bool {
        self.globals.read_flag(self.key)
    }

    /// Arm the token. Keep the guard alive until the triggered work is done.
    #[must_use = "dropping the guard disarms the token immediately"]
    pub fn arm(&self) -> ArmedToken {
        self.globals.write_flag(self.key, true);
        ArmedToken { flag: self.clone() }
    }

    /// Take the token if armed. Returns whether it was armed.
    pub fn consume(&self) -> bool {
        if !self.is_armed() {
            return false;
        }
        self.globals.write_flag(self.key, false);
        true
    }
}

/// Scope guard returned by [`OneShotFlag::arm`].
#[derive(Debug)]
pub struct ArmedToken {
    flag: OneShotFlag,
}

impl ArmedToken {
    /// True until the token has been consumed by its observer.
    pub fn is_pending(&self) -> bool {
        self.flag.is_armed()
    }
}

impl Drop for ArmedToken {
    fn drop(&mut self) {
        if self.flag.is_armed() {
            log::debug!("Disarming unconsumed token {}", self.flag.key);
            self.flag.globals.write_flag(self.flag.key, false);
        }
    }
}
