//! Bulk seed deletion.
//!
//! The user picks seed display names (`"Tulip Seed"`) from the inventory;
//! each pick is mapped back onto catalog species and deleted one wish at a
//! time in small batches.

use crate::context::ServiceContext;
use crate::store::{AtomKey, get_or_null};
use crate::toast::ToastLevel;
use garden_mod_hooks::spawn_detached;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

const TOAST_TITLE: &str = "Seed deleter";

pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(16);

/// One stack of seeds in the player's seed inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedItem {
    pub species: String,
    pub quantity: u64,
}

/// Seed stacks out of a raw seed inventory. Entries that are not seeds, have
/// no species or no quantity are skipped.
pub fn normalize_seed_inventory(raw: &Value) -> Vec<SeedItem> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.get("itemType").and_then(Value::as_str) == Some("Seed"))
        .filter_map(|item| {
            let species = item.get("species").and_then(Value::as_str)?.trim();
            let quantity = item.get("quantity").and_then(Value::as_f64)?.floor();
            (!species.is_empty() && quantity > 0.0).then(|| SeedItem {
                species: species.to_string(),
                quantity: quantity as u64,
            })
        })
        .collect()
}

/// A pending pick, keyed by display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSelection {
    pub name: String,
    pub qty: u64,
    pub max_qty: u64,
}

/// Progress after each batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteProgress {
    pub done: u64,
    pub total: u64,
    pub species: String,
    pub remaining_for_species: u64,
}

pub type ProgressFn = Arc<dyn Fn(&DeleteProgress) + Send + Sync>;

#[derive(Clone)]
pub struct DeleteOptions {
    /// `(display name, quantity)` pairs; the current selection when `None`.
    pub selection: Option<Vec<(String, u64)>>,
    pub batch_size: usize,
    pub delay: Duration,
    pub keep_selection: bool,
    pub on_progress: Option<ProgressFn>,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            selection: None,
            batch_size: DEFAULT_BATCH_SIZE,
            delay: DEFAULT_BATCH_DELAY,
            keep_selection: false,
            on_progress: None,
        }
    }
}

impl std::fmt::Debug for DeleteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteOptions")
            .field("selection", &self.selection)
            .field("batch_size", &self.batch_size)
            .field("delay", &self.delay)
            .field("keep_selection", &self.keep_selection)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    AlreadyRunning,
    NothingSelected,
    NothingAvailable,
    Deleted { total: u64, species: usize },
    Cancelled { done: u64, total: u64 },
}

/// Spread a request for `qty` seeds displayed as `name` over the species
/// that carry that seed name, taking from the largest stock first.
pub fn allocate(
    name: &str,
    qty: u64,
    catalog: &crate::catalog::PlantCatalog,
    stock: &HashMap<String, u64>,
) -> Vec<(String, u64)> {
    let mut candidates = catalog.species_for_seed_name(name);
    if candidates.is_empty() {
        let trimmed = name.trim_end();
        let fallback = trimmed
            .len()
            .checked_sub(" seed".len())
            .filter(|&cut| trimmed.is_char_boundary(cut))
            .filter(|&cut| trimmed[cut..].eq_ignore_ascii_case(" seed"))
            .map(|cut| trimmed[..cut].trim_end());
        if let Some(species) = fallback.filter(|s| catalog.contains(s)) {
            candidates.push(species.to_string());
        }
    }

    let mut ranked: Vec<(String, u64)> = candidates
        .into_iter()
        .filter_map(|species| {
            let available = stock.get(&species).copied().unwrap_or(0);
            (available > 0).then_some((species, available))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut remaining = qty;
    let mut out = Vec::new();
    for (species, available) in ranked {
        if remaining == 0 {
            break;
        }
        let take = available.min(remaining);
        out.push((species, take));
        remaining -= take;
    }
    out
}

/// `1234567` as `1,234,567`.
fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

struct DeleterInner {
    ctx: ServiceContext,
    selection: Mutex<BTreeMap<String, SeedSelection>>,
    stock_by_name: Mutex<HashMap<String, u64>>,
    busy: AtomicBool,
    abort: AtomicBool,
}

/// Clears the busy flag however a run ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct SeedDeleter {
    inner: Arc<DeleterInner>,
}

impl std::fmt::Debug for SeedDeleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedDeleter")
            .field("selected", &self.inner.selection.lock().len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SeedDeleter {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            inner: Arc::new(DeleterInner {
                ctx,
                selection: Mutex::new(BTreeMap::new()),
                stock_by_name: Mutex::new(HashMap::new()),
                busy: AtomicBool::new(false),
                abort: AtomicBool::new(false),
            }),
        }
    }

    pub async fn seed_inventory(&self) -> Vec<SeedItem> {
        normalize_seed_inventory(&get_or_null(&*self.inner.ctx.store, AtomKey::SeedInventory).await)
    }

    /// Re-read the seed inventory and rebuild the stock per display name.
    pub async fn refresh_stock(&self) -> Vec<SeedItem> {
        let seeds = self.seed_inventory().await;
        let mut stock = HashMap::new();
        for seed in &seeds {
            *stock.entry(self.inner.ctx.catalog.seed_name(&seed.species)).or_insert(0) += seed.quantity;
        }
        *self.inner.stock_by_name.lock() = stock;
        seeds
    }

    /// Select `name` with its whole stock, or deselect it. Returns whether it
    /// is selected afterwards.
    pub fn toggle_selection(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let mut selection = self.inner.selection.lock();
        if selection.remove(name).is_some() {
            return false;
        }
        let max_qty = self.inner.stock_by_name.lock().get(name).copied().unwrap_or(1).max(1);
        selection.insert(
            name.to_string(),
            SeedSelection {
                name: name.to_string(),
                qty: max_qty,
                max_qty,
            },
        );
        true
    }

    /// Change a selected quantity, clamped to `1..=max_qty`.
    pub fn set_quantity(&self, name: &str, qty: u64) -> Option<u64> {
        let mut selection = self.inner.selection.lock();
        let entry = selection.get_mut(name)?;
        entry.qty = qty.clamp(1, entry.max_qty.max(1));
        Some(entry.qty)
    }

    pub fn selection(&self) -> Vec<SeedSelection> {
        self.inner.selection.lock().values().cloned().collect()
    }

    pub fn clear_selection(&self) {
        self.inner.selection.lock().clear();
    }

    /// Toggle the selection whenever the game's selected item name changes.
    pub fn watch_selected_item_name(&self) -> Option<JoinHandle<()>> {
        let deleter = self.clone();
        spawn_detached("seed-deleter", async move {
            let mut names = deleter.inner.ctx.store.subscribe(AtomKey::SelectedItemName).await?;
            while let Some(name) = names.recv().await {
                if let Some(name) = name.as_str().map(str::trim).filter(|n| !n.is_empty()) {
                    let selected = deleter.toggle_selection(name);
                    log::debug!("Seed deleter: {} {}", if selected { "selected" } else { "deselected" }, name);
                }
            }
            Ok(())
        })
    }

    /// Stop a running deletion before its next batch.
    pub fn cancel(&self) {
        if self.is_running() {
            self.inner.abort.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    fn toast(&self, message: &str, level: ToastLevel) {
        self.inner.ctx.toaster.toast(TOAST_TITLE, message, level);
    }

    pub async fn delete_selected(&self, options: DeleteOptions) -> DeleteOutcome {
        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.toast("Deletion already in progress.", ToastLevel::Info);
            return DeleteOutcome::AlreadyRunning;
        }
        let _busy = BusyGuard(&self.inner.busy);
        self.inner.abort.store(false, Ordering::SeqCst);

        let batch_size = options.batch_size.max(1) as u64;
        let requests: Vec<(String, u64)> = options
            .selection
            .clone()
            .unwrap_or_else(|| self.selection().into_iter().map(|s| (s.name, s.qty)).collect())
            .into_iter()
            .filter(|(_, qty)| *qty > 0)
            .collect();

        if requests.is_empty() {
            self.toast("No seeds selected.", ToastLevel::Info);
            return DeleteOutcome::NothingSelected;
        }

        let mut stock: HashMap<String, u64> = HashMap::new();
        for seed in self.seed_inventory().await {
            *stock.entry(seed.species).or_insert(0) += seed.quantity;
        }

        let mut tasks: BTreeMap<String, u64> = BTreeMap::new();
        let mut requested = 0;
        for (name, qty) in &requests {
            requested += qty;
            for (species, take) in allocate(name, *qty, &self.inner.ctx.catalog, &stock) {
                *tasks.entry(species).or_insert(0) += take;
            }
        }
        let total: u64 = tasks.values().sum();

        if total == 0 {
            self.toast("Nothing to delete (not in inventory).", ToastLevel::Info);
            return DeleteOutcome::NothingAvailable;
        }
        if total < requested {
            self.toast(
                &format!(
                    "Requested {} but only {} available. Proceeding.",
                    format_count(requested),
                    format_count(total)
                ),
                ToastLevel::Info,
            );
        }

        self.toast(
            &format!("Deleting {} seeds across {} species...", format_count(total), tasks.len()),
            ToastLevel::Info,
        );

        let mut done = 0;
        for (species, qty) in &tasks {
            let mut remaining = *qty;
            while remaining > 0 {
                if self.inner.abort.load(Ordering::SeqCst) {
                    log::info!("Seed deletion cancelled after {}/{}", done, total);
                    self.toast("Deletion cancelled.", ToastLevel::Error);
                    return DeleteOutcome::Cancelled { done, total };
                }

                let n = batch_size.min(remaining);
                for _ in 0..n {
                    if let Err(e) = self.inner.ctx.player.wish(species).await {
                        log::debug!("Wish for {} failed: {}", species, e);
                    }
                }
                done += n;
                remaining -= n;

                if let Some(on_progress) = &options.on_progress {
                    on_progress(&DeleteProgress {
                        done,
                        total,
                        species: species.clone(),
                        remaining_for_species: remaining,
                    });
                }

                if !options.delay.is_zero() && remaining > 0 {
                    tokio::time::sleep(options.delay).await;
                }
            }
        }

        if !options.keep_selection {
            self.clear_selection();
        }
        log::info!("Deleted {} seeds ({} species)", total, tasks.len());
        self.toast(
            &format!("Deleted {} seeds ({} species).", format_count(total), tasks.len()),
            ToastLevel::Success,
        );
        DeleteOutcome::Deleted {
            total,
            species: tasks.len(),
        }
    }
}
