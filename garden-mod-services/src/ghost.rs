//! Ghost movement: walk the player tile by tile while movement keys are held.
//!
//! The controller captures `z q s d` / `w a s d` and arrow keys, and on every
//! frame advances an accumulator by the elapsed time. Each time it crosses
//! the step delay, and no step is in flight, the player is moved one tile
//! from its rounded position.

use crate::player::PlayerActions;
use garden_mod_config::ModSettings;
use garden_mod_hooks::spawn_detached;
use garden_mod_keybindings::KeyEvent;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Frame cadence of the background loop (about 60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

const MOVEMENT_KEYS: [&str; 10] = [
    "z", "q", "s", "d", "w", "a", "arrowup", "arrowdown", "arrowleft", "arrowright",
];

fn movement_key(event: &KeyEvent) -> Option<String> {
    let key = event.key.to_lowercase();
    MOVEMENT_KEYS.contains(&key.as_str()).then_some(key)
}

#[derive(Debug, Default)]
struct GhostState {
    running: bool,
    keys: HashSet<String>,
    delay_ms: u64,
    last_frame: Option<Instant>,
    acc_ms: f64,
}

struct GhostInner {
    player: Arc<dyn PlayerActions>,
    settings: ModSettings,
    state: Mutex<GhostState>,
    in_move: AtomicBool,
    frame_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for GhostInner {
    fn drop(&mut self) {
        if let Some(task) = self.frame_task.get_mut().take() {
            task.abort();
        }
    }
}

#[derive(Clone)]
pub struct GhostController {
    inner: Arc<GhostInner>,
}

impl std::fmt::Debug for GhostController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhostController")
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl GhostController {
    pub fn new(player: Arc<dyn PlayerActions>, settings: ModSettings) -> Self {
        let delay_ms = settings.ghost_delay_ms();
        Self {
            inner: Arc::new(GhostInner {
                player,
                settings,
                state: Mutex::new(GhostState {
                    delay_ms,
                    ..GhostState::default()
                }),
                in_move: AtomicBool::new(false),
                frame_task: Mutex::new(None),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Start capturing keys and, inside a runtime, the frame loop.
    /// A second start is a no-op.
    pub fn start(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.running {
                return;
            }
            state.running = true;
            state.keys.clear();
            state.last_frame = None;
            state.acc_ms = 0.0;
        }
        self.inner.in_move.store(false, Ordering::SeqCst);
        *self.inner.frame_task.lock() = spawn_frame_loop(Arc::downgrade(&self.inner));
        log::info!("Ghost movement started");
    }

    pub fn stop(&self) {
        if let Some(task) = self.inner.frame_task.lock().take() {
            task.abort();
        }
        let mut state = self.inner.state.lock();
        if state.running {
            log::info!("Ghost movement stopped");
        }
        state.running = false;
        state.keys.clear();
    }

    /// Returns whether the event was captured (the caller should stop it
    /// from reaching the game).
    pub fn key_down(&self, event: &KeyEvent) -> bool {
        let Some(key) = movement_key(event) else {
            return false;
        };
        let mut state = self.inner.state.lock();
        if !state.running {
            return false;
        }
        if !event.repeat {
            state.keys.insert(key);
        }
        true
    }

    pub fn key_up(&self, event: &KeyEvent) -> bool {
        let Some(key) = movement_key(event) else {
            return false;
        };
        let mut state = self.inner.state.lock();
        if !state.running {
            return false;
        }
        state.keys.remove(&key);
        true
    }

    pub fn blur(&self) {
        self.inner.state.lock().keys.clear();
    }

    pub fn visibility_changed(&self, visible: bool) {
        if !visible {
            self.blur();
        }
    }

    /// Unit step `(dx, dy)` of the held keys; opposite keys cancel out.
    pub fn direction(&self) -> (i64, i64) {
        direction_of(&self.inner.state.lock().keys)
    }

    /// Advance to `now`. Returns whether a step was started.
    pub fn frame(&self, now: Instant) -> bool {
        frame(&self.inner, now)
    }

    /// Change and persist the step delay. Returns the delay in effect.
    pub fn set_speed(&self, delay_ms: u64) -> u64 {
        let stored = self.inner.settings.set_ghost_delay_ms(delay_ms);
        self.inner.state.lock().delay_ms = stored;
        stored
    }

    pub fn speed(&self) -> u64 {
        self.inner.state.lock().delay_ms
    }
}

fn direction_of(keys: &HashSet<String>) -> (i64, i64) {
    let held = |names: &[&str]| names.iter().any(|n| keys.contains(*n));
    let mut dx = 0;
    let mut dy = 0;
    if held(&["z", "w", "arrowup"]) {
        dy -= 1;
    }
    if held(&["s", "arrowdown"]) {
        dy += 1;
    }
    if held(&["q", "a", "arrowleft"]) {
        dx -= 1;
    }
    if held(&["d", "arrowright"]) {
        dx += 1;
    }
    (dx, dy)
}

fn frame(inner: &Arc<GhostInner>, now: Instant) -> bool {
    let (dx, dy) = {
        let mut state = inner.state.lock();
        if !state.running {
            return false;
        }
        let elapsed = state
            .last_frame
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f64() * 1000.0);
        state.last_frame = Some(now);
        state.acc_ms += elapsed;

        let delay = state.delay_ms as f64;
        let (dx, dy) = direction_of(&state.keys);
        let stepping = (dx, dy) != (0, 0)
            && state.acc_ms >= delay
            && inner
                .in_move
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
        if stepping {
            state.acc_ms -= delay;
        }
        state.acc_ms = state.acc_ms.min(delay * 4.0);
        if !stepping {
            return false;
        }
        (dx, dy)
    };

    let player = Arc::clone(&inner.player);
    let weak = Arc::downgrade(inner);
    let spawned = spawn_detached("ghost", async move {
        step(&*player, dx, dy).await;
        if let Some(inner) = weak.upgrade() {
            inner.in_move.store(false, Ordering::SeqCst);
        }
        Ok(())
    });
    if spawned.is_none() {
        inner.in_move.store(false, Ordering::SeqCst);
    }
    spawned.is_some()
}

async fn step(player: &dyn PlayerActions, dx: i64, dy: i64) {
    let current = player.position().await.unwrap_or_else(|e| {
        log::debug!("Ghost could not read position: {}", e);
        None
    });
    let (x, y) = current.map_or((0, 0), |p| (p.x.round() as i64, p.y.round() as i64));
    if let Err(e) = player.move_to(x + dx, y + dy).await {
        log::debug!("Ghost move failed: {}", e);
    }
}

fn spawn_frame_loop(weak: Weak<GhostInner>) -> Option<JoinHandle<()>> {
    spawn_detached("ghost-frames", async move {
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let now = ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            frame(&inner, now);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{MemoryPlayer, PlayerCall, Position};
    use garden_mod_config::MemoryStore;

    fn controller() -> (GhostController, Arc<MemoryPlayer>) {
        let player = Arc::new(MemoryPlayer::new());
        let settings = ModSettings::new(Arc::new(MemoryStore::new()));
        (GhostController::new(player.clone(), settings), player)
    }

    fn key(key: &str) -> KeyEvent {
        KeyEvent {
            key: key.to_string(),
            ..KeyEvent::default()
        }
    }

    #[test]
    fn test_keys_are_ignored_until_started() {
        let (ghost, _) = controller();
        assert!(!ghost.key_down(&key("w")));
        ghost.start();
        assert!(ghost.key_down(&key("w")));
        assert!(!ghost.key_down(&key("x")));
        assert_eq!(ghost.direction(), (0, -1));
    }

    #[test]
    fn test_direction_sums_and_cancels() {
        let (ghost, _) = controller();
        ghost.start();
        ghost.key_down(&key("ArrowRight"));
        ghost.key_down(&key("S"));
        assert_eq!(ghost.direction(), (1, 1));
        ghost.key_down(&key("q"));
        assert_eq!(ghost.direction(), (0, 1));
        ghost.visibility_changed(false);
        assert_eq!(ghost.direction(), (0, 0));
    }

    #[test]
    fn test_speed_is_clamped_and_persisted() {
        let (ghost, _) = controller();
        assert_eq!(ghost.speed(), 50);
        assert_eq!(ghost.set_speed(2), 5);
        assert_eq!(ghost.inner.settings.ghost_delay_ms(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_steps_from_rounded_position() {
        let (ghost, player) = controller();
        player.set_position(Some(Position { x: 3.6, y: 7.2 }));
        ghost.start();
        ghost.stop_frame_loop_for_test();
        ghost.key_down(&key("d"));

        let t0 = Instant::now();
        assert!(!ghost.frame(t0));
        assert!(!ghost.frame(t0 + Duration::from_millis(30)));
        assert!(ghost.frame(t0 + Duration::from_millis(60)));
        // Still moving: the next due step waits for the first one.
        assert!(!ghost.frame(t0 + Duration::from_millis(120)));

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(player.calls(), vec![PlayerCall::MoveTo { x: 5, y: 7 }]);
        assert!(ghost.frame(t0 + Duration::from_millis(130)));
    }

    #[test]
    fn test_idle_accumulator_is_capped() {
        let (ghost, _) = controller();
        ghost.start();
        let t0 = Instant::now();
        ghost.frame(t0);
        ghost.frame(t0 + Duration::from_secs(10));
        assert_eq!(ghost.inner.state.lock().acc_ms, 200.0);
    }

    impl GhostController {
        fn stop_frame_loop_for_test(&self) {
            if let Some(task) = self.inner.frame_task.lock().take() {
                task.abort();
            }
        }
    }
}
