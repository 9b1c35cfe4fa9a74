//! Collaborators shared by the domain interceptors and services.

use crate::catalog::PlantCatalog;
use crate::locker::{HarvestLocker, NoLocker};
use crate::player::PlayerActions;
use crate::stats::StatsRecorder;
use crate::store::AtomStore;
use crate::toast::{LogToaster, Toaster};
use garden_mod_config::ModSettings;
use garden_mod_hooks::SharedGlobals;
use std::sync::Arc;
use std::time::Duration;

/// How long a hatch waits for the new pet to show up.
pub const DEFAULT_HATCH_TIMEOUT: Duration = Duration::from_secs(5);
/// How long sell-all orchestration waits for the inventory to change.
pub const DEFAULT_SELL_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct ServiceTimings {
    pub hatch_timeout: Duration,
    pub sell_settle_timeout: Duration,
}

impl Default for ServiceTimings {
    fn default() -> Self {
        Self {
            hatch_timeout: DEFAULT_HATCH_TIMEOUT,
            sell_settle_timeout: DEFAULT_SELL_SETTLE_TIMEOUT,
        }
    }
}

/// Everything the services talk to. Cheap to clone.
#[derive(Clone)]
pub struct ServiceContext {
    pub globals: Arc<dyn SharedGlobals>,
    pub store: Arc<dyn AtomStore>,
    pub player: Arc<dyn PlayerActions>,
    pub settings: ModSettings,
    pub toaster: Arc<dyn Toaster>,
    pub locker: Arc<dyn HarvestLocker>,
    pub stats: StatsRecorder,
    pub catalog: Arc<PlantCatalog>,
    pub timings: ServiceTimings,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("stats", &self.stats)
            .field("catalog_species", &self.catalog.len())
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl ServiceContext {
    /// A context that logs toasts, never locks harvests, counts in memory
    /// and knows no plants.
    pub fn new(
        globals: Arc<dyn SharedGlobals>,
        store: Arc<dyn AtomStore>,
        player: Arc<dyn PlayerActions>,
        settings: ModSettings,
    ) -> Self {
        Self {
            globals,
            store,
            player,
            settings,
            toaster: Arc::new(LogToaster),
            locker: Arc::new(NoLocker),
            stats: StatsRecorder::new(),
            catalog: Arc::new(PlantCatalog::default()),
            timings: ServiceTimings::default(),
        }
    }

    pub fn with_toaster(mut self, toaster: Arc<dyn Toaster>) -> Self {
        self.toaster = toaster;
        self
    }

    pub fn with_locker(mut self, locker: Arc<dyn HarvestLocker>) -> Self {
        self.locker = locker;
        self
    }

    pub fn with_stats(mut self, stats: StatsRecorder) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<PlantCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_timings(mut self, timings: ServiceTimings) -> Self {
        self.timings = timings;
        self
    }
}
