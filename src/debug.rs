//! Debug log bridge for garden-mod
//!
//! Routes every `log` record from all garden-mod crates into one file:
//! /tmp/garden_mod_debug.log on Unix/macOS, %TEMP%\garden_mod_debug.log on
//! Windows. The game page owns stdout/console, so nothing is printed there.
//!
//! The level comes from, in order:
//! - the explicit argument to [`init_log_bridge`]
//! - `RUST_LOG` (a bare level, or the level of the last `target=level` directive)
//! - `DEBUG_LEVEL`: 0 off, 1 errors, 2 info, 3 debug, 4 trace

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().parse::<u8>() {
            Ok(0) => Some(DebugLevel::Off),
            Ok(1) => Some(DebugLevel::Error),
            Ok(2) => Some(DebugLevel::Info),
            Ok(3) => Some(DebugLevel::Debug),
            Ok(4) => Some(DebugLevel::Trace),
            _ => None,
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            DebugLevel::Off => LevelFilter::Off,
            DebugLevel::Error => LevelFilter::Error,
            DebugLevel::Info => LevelFilter::Info,
            DebugLevel::Debug => LevelFilter::Debug,
            DebugLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn parse_rust_log(value: &str) -> Option<LevelFilter> {
    let value = value.trim();
    if let Ok(level) = value.parse::<LevelFilter>() {
        return Some(level);
    }
    value
        .split(',')
        .filter_map(|directive| directive.rsplit_once('=').map(|(_, level)| level))
        .filter_map(|level| level.trim().parse::<LevelFilter>().ok())
        .last()
}

/// Pick the effective level from an explicit choice and the two environment
/// variables' values.
pub fn resolve_level(
    explicit: Option<LevelFilter>,
    rust_log: Option<&str>,
    debug_level: Option<&str>,
) -> LevelFilter {
    explicit
        .or_else(|| rust_log.and_then(parse_rust_log))
        .or_else(|| debug_level.and_then(DebugLevel::parse).map(DebugLevel::to_level_filter))
        .unwrap_or(LevelFilter::Off)
}

/// Where the bridge writes.
pub fn log_path() -> PathBuf {
    #[cfg(windows)]
    let path = std::env::temp_dir().join("garden_mod_debug.log");
    #[cfg(not(windows))]
    let path = PathBuf::from("/tmp/garden_mod_debug.log");
    path
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

struct FileLogger {
    level: LevelFilter,
    file: Mutex<Option<File>>,
}

impl FileLogger {
    fn open(level: LevelFilter) -> Self {
        let file = if level == LevelFilter::Off {
            None
        } else {
            // Silently run without a file if it can't be opened
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .create(true)
                .open(log_path())
                .ok()
        };
        let logger = FileLogger {
            level,
            file: Mutex::new(file),
        };
        logger.write_raw(&format!(
            "\n{}\ngarden-mod {} debug session started at {} (level={})\n{}\n",
            "=".repeat(80),
            crate::VERSION,
            get_timestamp(),
            level,
            "=".repeat(80)
        ));
        logger
    }

    fn write_raw(&self, msg: &str) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.write_raw(&format!(
            "[{}] [{:<5}] [{}] {}\n",
            get_timestamp(),
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

static LOGGER: OnceLock<FileLogger> = OnceLock::new();

/// Install the file logger as the `log` backend.
///
/// Only the first call has an effect; later calls (or a logger installed by
/// the embedder) leave things as they are. Returns the level in effect for
/// this bridge.
pub fn init_log_bridge(level: Option<LevelFilter>) -> LevelFilter {
    if let Some(existing) = LOGGER.get() {
        return existing.level;
    }
    let rust_log = std::env::var("RUST_LOG").ok();
    let debug_level = std::env::var("DEBUG_LEVEL").ok();
    let resolved = resolve_level(level, rust_log.as_deref(), debug_level.as_deref());

    let logger = LOGGER.get_or_init(|| FileLogger::open(resolved));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.level);
    }
    logger.level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level_wins() {
        assert_eq!(
            resolve_level(Some(LevelFilter::Warn), Some("trace"), Some("4")),
            LevelFilter::Warn
        );
    }

    #[test]
    fn test_rust_log_forms() {
        assert_eq!(resolve_level(None, Some("debug"), Some("1")), LevelFilter::Debug);
        assert_eq!(
            resolve_level(None, Some("tokio=warn,garden_mod=INFO"), None),
            LevelFilter::Info
        );
        assert_eq!(resolve_level(None, Some("garden_mod"), Some("3")), LevelFilter::Debug);
    }

    #[test]
    fn test_debug_level_numbers() {
        assert_eq!(resolve_level(None, None, Some("0")), LevelFilter::Off);
        assert_eq!(resolve_level(None, None, Some("2")), LevelFilter::Info);
        assert_eq!(resolve_level(None, None, Some("4")), LevelFilter::Trace);
        assert_eq!(resolve_level(None, None, Some("9")), LevelFilter::Off);
        assert_eq!(resolve_level(None, None, None), LevelFilter::Off);
    }

    #[test]
    fn test_log_path_name() {
        assert!(log_path().ends_with("garden_mod_debug.log"));
    }
}
