//! Per-message-type interceptor registry.

use crate::message::GameMessage;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What an interceptor decided about a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Do not send the message; later interceptors do not run.
    Drop,
    /// Continue with this message instead.
    Replace(GameMessage),
}

/// Call-site information passed to every interceptor.
#[derive(Debug, Clone, Copy)]
pub struct InterceptContext<'a> {
    /// Extra arguments of the intercepted send call.
    pub args: &'a [Value],
}

/// An interceptor. `Ok(None)` means "no opinion"; an `Err` is logged and
/// treated the same way.
pub type Interceptor =
    Arc<dyn Fn(&GameMessage, &InterceptContext<'_>) -> anyhow::Result<Option<Verdict>> + Send + Sync>;

/// Result of running a message through its interceptor chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Forward(GameMessage),
    Dropped,
}

/// Ordered interceptor lists keyed by message type.
#[derive(Default)]
pub struct InterceptorRegistry {
    by_type: Mutex<HashMap<String, Vec<(u64, Interceptor)>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let by_type = self.by_type.lock();
        let counts: HashMap<&str, usize> =
            by_type.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("InterceptorRegistry")
            .field("by_type", &counts)
            .finish()
    }
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor for `message_type`. Returns its id.
    pub fn add(&self, message_type: &str, interceptor: Interceptor) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.by_type
            .lock()
            .entry(message_type.to_string())
            .or_default()
            .push((id, interceptor));
        id
    }

    /// Remove one interceptor. Returns whether it was registered.
    pub fn remove(&self, message_type: &str, id: u64) -> bool {
        let mut by_type = self.by_type.lock();
        let Some(list) = by_type.get_mut(message_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(i, _)| *i != id);
        let removed = list.len() != before;
        if list.is_empty() {
            by_type.remove(message_type);
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.lock().is_empty()
    }

    pub fn count(&self, message_type: &str) -> usize {
        self.by_type.lock().get(message_type).map_or(0, Vec::len)
    }

    fn snapshot(&self, message_type: &str) -> Vec<Interceptor> {
        self.by_type
            .lock()
            .get(message_type)
            .map(|list| list.iter().map(|(_, i)| Arc::clone(i)).collect())
            .unwrap_or_default()
    }

    /// Fold `message` through the interceptors registered for its type.
    ///
    /// Runs over a snapshot of the list, so interceptors may register or
    /// unregister while the chain runs. An interceptor that errors or panics
    /// is logged and skipped.
    pub fn apply(&self, message: GameMessage, args: &[Value]) -> Outcome {
        let Some(message_type) = message.message_type().map(str::to_string) else {
            return Outcome::Forward(message);
        };
        let chain = self.snapshot(&message_type);
        if chain.is_empty() {
            return Outcome::Forward(message);
        }

        let context = InterceptContext { args };
        let mut current = message;
        for interceptor in chain {
            let result = catch_unwind(AssertUnwindSafe(|| interceptor(&current, &context)));
            match result {
                Ok(Ok(None)) => {}
                Ok(Ok(Some(Verdict::Drop))) => {
                    log::debug!("[{}] dropped by interceptor", message_type);
                    return Outcome::Dropped;
                }
                Ok(Ok(Some(Verdict::Replace(next)))) => current = next,
                Ok(Err(e)) => log::error!("[{}] interceptor failed: {:#}", message_type, e),
                Err(_) => log::error!("[{}] interceptor panicked", message_type),
            }
        }
        Outcome::Forward(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interceptor<F>(f: F) -> Interceptor
    where
        F: Fn(&GameMessage, &InterceptContext<'_>) -> anyhow::Result<Option<Verdict>>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(f)
    }

    fn tag(step: &'static str) -> Interceptor {
        interceptor(move |msg, _| {
            let trail = msg
                .get("trail")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Some(Verdict::Replace(msg.clone().with("trail", trail + step))))
        })
    }

    #[test]
    fn test_replace_folds_left_to_right() {
        let registry = InterceptorRegistry::new();
        registry.add("PlantSeed", tag("a"));
        registry.add("PlantSeed", tag("b"));
        registry.add("PlantSeed", tag("c"));

        match registry.apply(GameMessage::new("PlantSeed"), &[]) {
            Outcome::Forward(msg) => assert_eq!(msg.get("trail"), Some(&Value::from("abc"))),
            Outcome::Dropped => panic!("unexpected drop"),
        }
    }

    #[test]
    fn test_drop_short_circuits() {
        let registry = InterceptorRegistry::new();
        let ran = Arc::new(AtomicU64::new(0));
        let r = ran.clone();
        registry.add("SellPet", interceptor(|_, _| Ok(Some(Verdict::Drop))));
        registry.add(
            "SellPet",
            interceptor(move |_, _| {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }),
        );
        assert_eq!(registry.apply(GameMessage::new("SellPet"), &[]), Outcome::Dropped);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_errors_and_panics_are_no_opinion() {
        let registry = InterceptorRegistry::new();
        registry.add("WaterPlant", interceptor(|_, _| anyhow::bail!("boom")));
        registry.add("WaterPlant", interceptor(|_, _| panic!("kaboom")));
        registry.add("WaterPlant", tag("x"));
        match registry.apply(GameMessage::new("WaterPlant"), &[]) {
            Outcome::Forward(msg) => assert_eq!(msg.get("trail"), Some(&Value::from("x"))),
            Outcome::Dropped => panic!("unexpected drop"),
        }
    }

    #[test]
    fn test_untyped_and_unregistered_messages_pass() {
        let registry = InterceptorRegistry::new();
        registry.add("WaterPlant", interceptor(|_, _| Ok(Some(Verdict::Drop))));
        let untyped = GameMessage::default().with("slot", 1);
        assert_eq!(
            registry.apply(untyped.clone(), &[]),
            Outcome::Forward(untyped)
        );
        let other = GameMessage::new("PlantSeed");
        assert_eq!(registry.apply(other.clone(), &[]), Outcome::Forward(other));
    }

    #[test]
    fn test_remove() {
        let registry = InterceptorRegistry::new();
        let id = registry.add("HatchEgg", tag("a"));
        assert_eq!(registry.count("HatchEgg"), 1);
        assert!(registry.remove("HatchEgg", id));
        assert!(!registry.remove("HatchEgg", id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_context_carries_args() {
        let registry = InterceptorRegistry::new();
        registry.add(
            "PlantSeed",
            interceptor(|msg, ctx| {
                Ok(Some(Verdict::Replace(
                    msg.clone().with("argc", ctx.args.len() as u64),
                )))
            }),
        );
        match registry.apply(GameMessage::new("PlantSeed"), &[Value::from(1), Value::Null]) {
            Outcome::Forward(msg) => assert_eq!(msg.integer_field("argc"), Some(2)),
            Outcome::Dropped => panic!("unexpected drop"),
        }
    }
}
