//! Message interceptor hub.
//!
//! Owns the interceptor registry and installs the send-call wrapper on the
//! host connection exactly once. Installation is lazy: the first
//! [`MessageHub::register`] triggers it. If the host connection is not there
//! yet, a detached task polls for it (200 ms interval, 20 s timeout by
//! default); on timeout the hub goes back to idle and the next registration
//! tries again.

use crate::bridge::{SharedGlobals, keys};
use crate::interception::{HostLocator, InterceptionPoint, RestoreHandle, SendFn};
use crate::interceptor::{InterceptContext, Interceptor, InterceptorRegistry, Outcome, Verdict};
use crate::message::GameMessage;
use crate::wait::wait_for;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Default delay between host lookups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Default time to wait for the host before giving up.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(20);

/// Installation state of the send-call wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Idle,
    Installing,
    /// Permanent for the lifetime of the hub.
    Installed,
}

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub poll_interval: Duration,
    pub install_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }
}

struct HubInner {
    registry: InterceptorRegistry,
    globals: Arc<dyn SharedGlobals>,
    locator: Arc<dyn HostLocator>,
    config: HubConfig,
    status: Mutex<InstallStatus>,
    restore: Mutex<Option<RestoreHandle>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    wraps: AtomicUsize,
}

impl HubInner {
    /// Try to wrap the host's send function. True once installed.
    fn try_install(self: &Arc<Self>) -> bool {
        let mut status = self.status.lock();
        if *status == InstallStatus::Installed {
            return true;
        }
        let Some(connection) = self.locator.locate() else {
            return false;
        };
        let Some(point) = InterceptionPoint::resolve(connection) else {
            log::debug!("Host connection found but has no sendMessage yet");
            return false;
        };

        let slot = point.slot();
        let weak = Arc::downgrade(self);
        let (_, restore) = point.wrap(move |original| wrap_send(weak, original));
        *self.restore.lock() = Some(restore);
        *status = InstallStatus::Installed;
        drop(status);

        self.wraps.fetch_add(1, Ordering::SeqCst);
        self.globals.write_flag(keys::MESSAGE_HOOK_INSTALLED, true);
        log::info!("Message interceptor installed on {:?} sendMessage", slot);
        true
    }

    fn apply(&self, message: GameMessage, args: &[Value]) -> Outcome {
        if self.registry.is_empty() {
            return Outcome::Forward(message);
        }
        self.registry.apply(message, args)
    }
}

impl Drop for HubInner {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.get_mut().take() {
            task.abort();
        }
    }
}

fn wrap_send(hub: Weak<HubInner>, original: SendFn) -> SendFn {
    Arc::new(move |message: GameMessage, args: &[Value]| {
        let outcome = match hub.upgrade() {
            Some(hub) => hub.apply(message, args),
            None => Outcome::Forward(message),
        };
        if let Outcome::Forward(message) = outcome {
            original(message, args);
        }
    })
}

/// Handle to one registered interceptor.
#[derive(Debug)]
pub struct Registration {
    hub: Weak<HubInner>,
    message_type: String,
    id: u64,
}

impl Registration {
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Remove the interceptor. Returns whether it was still registered.
    pub fn unregister(self) -> bool {
        self.hub
            .upgrade()
            .is_some_and(|hub| hub.registry.remove(&self.message_type, self.id))
    }
}

impl std::fmt::Debug for HubInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHub")
            .field("status", &*self.status.lock())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Interceptor hub handle. Clones share one registry and one installation.
#[derive(Clone, Debug)]
pub struct MessageHub {
    inner: Arc<HubInner>,
}

impl MessageHub {
    pub fn new(globals: Arc<dyn SharedGlobals>, locator: Arc<dyn HostLocator>) -> Self {
        Self::with_config(globals, locator, HubConfig::default())
    }

    /// Create a hub. It starts out installed if another context already
    /// flagged the wrapper as installed.
    pub fn with_config(
        globals: Arc<dyn SharedGlobals>,
        locator: Arc<dyn HostLocator>,
        config: HubConfig,
    ) -> Self {
        let status = if globals.read_flag(keys::MESSAGE_HOOK_INSTALLED) {
            log::info!("Message interceptor already installed by another context");
            InstallStatus::Installed
        } else {
            InstallStatus::Idle
        };
        Self {
            inner: Arc::new(HubInner {
                registry: InterceptorRegistry::new(),
                globals,
                locator,
                config,
                status: Mutex::new(status),
                restore: Mutex::new(None),
                poll_task: Mutex::new(None),
                wraps: AtomicUsize::new(0),
            }),
        }
    }

    pub fn status(&self) -> InstallStatus {
        *self.inner.status.lock()
    }

    pub fn globals(&self) -> &Arc<dyn SharedGlobals> {
        &self.inner.globals
    }

    /// How many times this hub wrapped a host send function (0 or 1).
    pub fn wrap_count(&self) -> usize {
        self.inner.wraps.load(Ordering::SeqCst)
    }

    /// Register `interceptor` for `message_type` and make sure the wrapper
    /// is installed (or being installed).
    pub fn register<F>(&self, message_type: &str, interceptor: F) -> Registration
    where
        F: Fn(&GameMessage, &InterceptContext<'_>) -> anyhow::Result<Option<Verdict>>
            + Send
            + Sync
            + 'static,
    {
        let interceptor: Interceptor = Arc::new(interceptor);
        let id = self.inner.registry.add(message_type, interceptor);
        self.ensure_installed();
        Registration {
            hub: Arc::downgrade(&self.inner),
            message_type: message_type.to_string(),
            id,
        }
    }

    /// Start installation unless it is installed or already in flight.
    ///
    /// Tries synchronously first; if the host is not there yet and a tokio
    /// runtime is available, polls for it in a detached task.
    pub fn ensure_installed(&self) {
        {
            let mut status = self.inner.status.lock();
            if *status != InstallStatus::Idle {
                return;
            }
            *status = InstallStatus::Installing;
        }

        if self.inner.try_install() {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No async runtime; message interceptor install deferred");
            *self.inner.status.lock() = InstallStatus::Idle;
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let HubConfig {
            poll_interval,
            install_timeout,
        } = self.inner.config;
        log::debug!(
            "Host connection not ready; polling every {:?} for up to {:?}",
            poll_interval,
            install_timeout
        );
        let task = runtime.spawn(async move {
            let found = wait_for(poll_interval, install_timeout, || match weak.upgrade() {
                Some(inner) => inner.try_install().then_some(()),
                None => Some(()),
            })
            .await;
            if found.is_some() {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                let mut status = inner.status.lock();
                if *status != InstallStatus::Installed {
                    *status = InstallStatus::Idle;
                    log::warn!(
                        "Host connection not found after {} ms; outgoing messages are not intercepted",
                        install_timeout.as_millis()
                    );
                }
            }
        });
        *self.inner.poll_task.lock() = Some(task);
    }

    /// Run `message` through the interceptors without sending it anywhere.
    pub fn dispatch(&self, message: GameMessage, args: &[Value]) -> Outcome {
        self.inner.apply(message, args)
    }

    /// Take the handle that reinstalls the host's original send function.
    pub fn take_restore_handle(&self) -> Option<RestoreHandle> {
        self.inner.restore.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LocalGlobals;
    use crate::interception::{HostSlot, MemoryConnection, SendSlot};

    fn counting_send() -> (SendFn, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            Arc::new(move |_: GameMessage, _: &[Value]| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            count,
        )
    }

    #[test]
    fn test_installs_synchronously_when_host_present() {
        let (send, _) = counting_send();
        let host = Arc::new(HostSlot::new());
        host.set(Arc::new(MemoryConnection::with_send(SendSlot::Prototype, send)));
        let globals = Arc::new(LocalGlobals::new());
        let hub = MessageHub::new(globals.clone(), host);

        hub.register("WaterPlant", |_, _| Ok(None));
        assert_eq!(hub.status(), InstallStatus::Installed);
        assert_eq!(hub.wrap_count(), 1);
        assert!(globals.read_flag(keys::MESSAGE_HOOK_INSTALLED));
    }

    #[test]
    fn test_no_runtime_reverts_to_idle() {
        let hub = MessageHub::new(Arc::new(LocalGlobals::new()), Arc::new(HostSlot::new()));
        hub.register("WaterPlant", |_, _| Ok(None));
        assert_eq!(hub.status(), InstallStatus::Idle);
    }

    #[test]
    fn test_flag_from_other_context_skips_install() {
        let globals = Arc::new(LocalGlobals::new());
        globals.write_flag(keys::MESSAGE_HOOK_INSTALLED, true);
        let hub = MessageHub::new(globals, Arc::new(HostSlot::new()));
        assert_eq!(hub.status(), InstallStatus::Installed);
        hub.register("WaterPlant", |_, _| Ok(None));
        assert_eq!(hub.wrap_count(), 0);
    }

    #[test]
    fn test_restore_handle_unwraps() {
        let (send, count) = counting_send();
        let conn = Arc::new(MemoryConnection::with_send(SendSlot::Static, send));
        let host = Arc::new(HostSlot::new());
        host.set(conn.clone());
        let hub = MessageHub::new(Arc::new(LocalGlobals::new()), host);
        hub.register("WaterPlant", |_, _| Ok(Some(Verdict::Drop)));

        conn.send(GameMessage::new("WaterPlant"), &[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        hub.take_restore_handle().unwrap().restore();
        conn.send(GameMessage::new("WaterPlant"), &[]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
