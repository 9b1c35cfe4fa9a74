//! Storage file watcher.
//!
//! Watches the JSON storage file so writes made by another process (a second
//! browser profile, a companion tool) are picked up without a restart.
//! Uses debouncing to avoid reloading several times for one atomic save.

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, PollWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Keeps a filesystem watcher alive for one storage file.
///
/// Dropping the value stops watching.
pub struct StoreWatcher {
    _watcher: Box<dyn Watcher + Send>,
    path: PathBuf,
}

impl std::fmt::Debug for StoreWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

type ChangeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

fn make_event_handler(
    filename: std::ffi::OsString,
    debounce_delay: Duration,
    on_change: ChangeCallback,
    last_event_time: Arc<Mutex<Option<Instant>>>,
) -> impl Fn(std::result::Result<Event, notify::Error>) + Send + 'static {
    move |result: std::result::Result<Event, notify::Error>| {
        let Ok(event) = result else {
            return;
        };

        // Create covers atomic temp-file + rename saves
        if !matches!(
            event.kind,
            notify::EventKind::Modify(_) | notify::EventKind::Create(_)
        ) {
            return;
        }

        let touches_store = event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|f| f == filename));
        if !touches_store {
            return;
        }

        let should_fire = {
            let now = Instant::now();
            let mut last = last_event_time.lock();
            match *last {
                Some(prev) if now.duration_since(prev) < debounce_delay => {
                    log::trace!("Debouncing storage change event");
                    false
                }
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };

        if should_fire {
            on_change();
        }
    }
}

impl StoreWatcher {
    /// Start watching `path`, invoking `on_change` (debounced) whenever the file
    /// is modified or recreated.
    ///
    /// Uses the platform's native watcher and falls back to a 500 ms
    /// `PollWatcher` where the native backend is unavailable.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or both backends fail.
    pub fn new<F>(path: &Path, debounce_delay_ms: u64, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if !path.exists() {
            anyhow::bail!("Storage file not found: {}", path.display());
        }

        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        let filename = canonical
            .file_name()
            .context("Storage path has no filename")?
            .to_os_string();
        let parent_dir = canonical
            .parent()
            .context("Storage path has no parent directory")?
            .to_path_buf();

        let on_change: ChangeCallback = Arc::new(on_change);
        let debounce_delay = Duration::from_millis(debounce_delay_ms);
        let last_event_time = Arc::new(Mutex::new(None));

        let handler = make_event_handler(
            filename.clone(),
            debounce_delay,
            Arc::clone(&on_change),
            Arc::clone(&last_event_time),
        );

        let mut watcher: Box<dyn Watcher + Send> = match notify::recommended_watcher(handler) {
            Ok(w) => {
                log::debug!("Storage watcher: using native backend");
                Box::new(w)
            }
            Err(e) => {
                log::warn!(
                    "Storage watcher: native backend unavailable ({}); falling back to PollWatcher",
                    e
                );
                let fallback = make_event_handler(filename, debounce_delay, on_change, last_event_time);
                Box::new(
                    PollWatcher::new(
                        fallback,
                        NotifyConfig::default().with_poll_interval(Duration::from_millis(500)),
                    )
                    .context("Failed to create fallback PollWatcher")?,
                )
            }
        };

        watcher
            .watch(&parent_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", parent_dir.display()))?;

        log::info!("Storage watcher: watching {}", canonical.display());

        Ok(Self {
            _watcher: watcher,
            path: canonical,
        })
    }

    /// The canonical path being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_creation_with_existing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("storage.json");
        fs::write(&path, "{}").expect("Failed to write storage");

        let watcher = StoreWatcher::new(&path, 50, || {});
        assert!(watcher.is_ok());
    }

    #[test]
    fn test_watcher_creation_with_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nope.json");
        assert!(StoreWatcher::new(&path, 50, || {}).is_err());
    }
}
