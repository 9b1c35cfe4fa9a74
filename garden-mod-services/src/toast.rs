//! Transient user notifications.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub level: ToastLevel,
}

/// Where user-visible notices go. Rendering is up to the embedder.
pub trait Toaster: Send + Sync {
    fn toast(&self, title: &str, message: &str, level: ToastLevel);
}

/// Writes toasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToaster;

impl Toaster for LogToaster {
    fn toast(&self, title: &str, message: &str, level: ToastLevel) {
        match level {
            ToastLevel::Info | ToastLevel::Success => log::info!("{}: {}", title, message),
            ToastLevel::Warn => log::warn!("{}: {}", title, message),
            ToastLevel::Error => log::error!("{}: {}", title, message),
        }
    }
}

/// Keeps every toast.
#[derive(Debug, Default)]
pub struct MemoryToaster {
    toasts: Mutex<Vec<Toast>>,
}

impl MemoryToaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    pub fn last(&self) -> Option<Toast> {
        self.toasts.lock().last().cloned()
    }
}

impl Toaster for MemoryToaster {
    fn toast(&self, title: &str, message: &str, level: ToastLevel) {
        self.toasts.lock().push(Toast {
            title: title.to_string(),
            message: message.to_string(),
            level,
        });
    }
}
