//! Harvest locker policy.

/// What the locker is asked about a harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestRequest {
    pub seed_key: Option<String>,
    /// 0 to 100.
    pub size_percent: u8,
    pub mutations: Vec<String>,
}

/// Decides whether a crop may be harvested.
///
/// Both methods may fail; a failing `enabled` counts as disabled and a
/// failing `allows_harvest` allows the harvest.
pub trait HarvestLocker: Send + Sync {
    fn enabled(&self) -> anyhow::Result<bool>;
    fn allows_harvest(&self, request: &HarvestRequest) -> anyhow::Result<bool>;
}

/// A locker that never blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocker;

impl HarvestLocker for NoLocker {
    fn enabled(&self) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn allows_harvest(&self, _request: &HarvestRequest) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Locks harvests below a minimum size or carrying none of the wanted mutations.
#[derive(Debug, Clone, Default)]
pub struct ThresholdLocker {
    pub enabled: bool,
    pub min_size_percent: u8,
    /// If non-empty, at least one of these (case-insensitive) is required.
    pub required_mutations: Vec<String>,
}

impl HarvestLocker for ThresholdLocker {
    fn enabled(&self) -> anyhow::Result<bool> {
        Ok(self.enabled)
    }

    fn allows_harvest(&self, request: &HarvestRequest) -> anyhow::Result<bool> {
        if request.size_percent < self.min_size_percent {
            return Ok(false);
        }
        if self.required_mutations.is_empty() {
            return Ok(true);
        }
        Ok(request.mutations.iter().any(|m| {
            self.required_mutations
                .iter()
                .any(|r| r.eq_ignore_ascii_case(m))
        }))
    }
}
