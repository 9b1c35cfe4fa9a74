//! Awaiting host capabilities that load at an unpredictable time.

use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Poll `probe` every `interval` until it yields a value or `timeout` elapses.
///
/// The first probe runs immediately. Returns `None` on timeout. Dropping the
/// future (or aborting the task that runs it) cancels the wait.
pub async fn wait_for<T, F>(interval: Duration, timeout: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = Instant::now() + timeout;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Some(value) = probe() {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success() {
        let started = Instant::now();
        let got = wait_for(Duration::from_millis(200), Duration::from_secs(20), || Some(7)).await;
        assert_eq!(got, Some(7));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_later_probe() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let got = wait_for(Duration::from_millis(200), Duration::from_secs(20), move || {
            (c.fetch_add(1, Ordering::SeqCst) == 3).then_some("ready")
        })
        .await;
        assert_eq!(got, Some("ready"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let started = Instant::now();
        let got: Option<()> =
            wait_for(Duration::from_millis(200), Duration::from_secs(20), || None).await;
        assert_eq!(got, None);
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(started.elapsed() < Duration::from_millis(20_400));
    }
}
