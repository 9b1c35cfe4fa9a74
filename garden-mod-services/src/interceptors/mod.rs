//! Domain interceptors registered on the message hub.
//!
//! [`install_domain_interceptors`] wires every gate and counter once per
//! page; the shared harvest-hook flag keeps a second bundle from installing.

mod counters;
mod harvest;
mod hatch;
mod mirror;
mod sell;

pub use counters::WATER_TIME_SAVED_MS;
pub use hatch::wait_for_new_pets;
pub use mirror::GardenMirror;
pub use sell::{
    SELL_BLOCKED_MESSAGE, SELL_BLOCKED_TITLE, orchestrate_sell_all, protected_item_ids,
    sell_all_allow_flag, toast_sell_blocked,
};

use crate::context::ServiceContext;
use garden_mod_hooks::{MessageHub, Registration, keys};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything [`install_domain_interceptors`] set up.
#[derive(Debug)]
pub struct DomainInterceptors {
    registrations: Vec<Registration>,
    tasks: Vec<JoinHandle<()>>,
    mirror: Arc<GardenMirror>,
    ctx: ServiceContext,
}

impl DomainInterceptors {
    pub fn mirror(&self) -> &Arc<GardenMirror> {
        &self.mirror
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Remove every interceptor, stop background tasks and clear the
    /// installed flag.
    pub fn uninstall(self) {
        for registration in self.registrations {
            registration.unregister();
        }
        for task in self.tasks {
            task.abort();
        }
        self.ctx.globals.write_flag(keys::HARVEST_HOOK_INSTALLED, false);
        log::info!("Domain interceptors removed");
    }
}

/// Register the harvest gate, activity counters, sell-all orchestration,
/// sale counters and hatch tracking, and start the garden mirror and
/// pet-food auto-favorite tasks.
///
/// Returns `None` when the shared flag says another copy already did this.
pub fn install_domain_interceptors(hub: &MessageHub, ctx: &ServiceContext) -> Option<DomainInterceptors> {
    if ctx.globals.read_flag(keys::HARVEST_HOOK_INSTALLED) {
        log::debug!("Domain interceptors already installed");
        return None;
    }

    let mirror = Arc::new(GardenMirror::new());
    let mut tasks = Vec::new();
    tasks.extend(mirror.spawn_sync(Arc::clone(&ctx.store)));
    tasks.extend(sell::spawn_auto_favorite(ctx));

    let mut registrations = vec![harvest::register(hub, ctx, Arc::clone(&mirror))];
    registrations.extend(counters::register(hub, ctx));
    registrations.push(sell::register_sell_all(hub, ctx));
    registrations.push(sell::register_sell_pet(hub, ctx));
    registrations.push(hatch::register(hub, ctx));

    ctx.globals.write_flag(keys::HARVEST_HOOK_INSTALLED, true);
    log::info!("Domain interceptors installed ({} registrations)", registrations.len());

    Some(DomainInterceptors {
        registrations,
        tasks,
        mirror,
        ctx: ctx.clone(),
    })
}
