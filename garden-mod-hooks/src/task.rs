//! Detached side-effect tasks.
//!
//! Interceptors run synchronously inside the send call; any asynchronous
//! follow-up (store reads, orchestration, timers) is spawned here. Errors are
//! logged at the task boundary and never reach the dispatch path.

use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Spawn `future` on the current tokio runtime and log its error, if any.
///
/// Returns `None` (and logs) when called outside a runtime.
pub fn spawn_detached<F>(label: &'static str, future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let Ok(runtime) = Handle::try_current() else {
        log::warn!("[{}] no async runtime; side effect skipped", label);
        return None;
    };
    Some(runtime.spawn(async move {
        if let Err(e) = future.await {
            log::error!("[{}] {:#}", label, e);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_runs_future() {
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        let handle = spawn_detached("test", async move {
            r.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_error_is_contained() {
        let handle = spawn_detached("test", async { anyhow::bail!("store unavailable") }).unwrap();
        assert!(handle.await.is_ok());
    }

    #[test]
    fn test_outside_runtime() {
        assert!(spawn_detached("test", async { Ok(()) }).is_none());
    }
}
