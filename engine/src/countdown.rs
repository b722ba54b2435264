//! Cancellable one-second countdown.
//!
//! The remaining time is published on a `watch` channel; tick and expiry
//! events go out on a `broadcast` channel. A run is identified by a
//! generation number so a tick that races a `cancel()` or a restart is
//! discarded instead of overwriting the newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

const TICK: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 16;

/// Observable countdown position.
///
/// `remaining_seconds == 0` implies `!is_running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountdownState {
    pub remaining_seconds: u32,
    pub is_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick { remaining: u32 },
    /// Sent exactly once per run that reaches zero.
    Expired,
}

#[derive(Debug)]
struct Shared {
    state: watch::Sender<CountdownState>,
    events: broadcast::Sender<CountdownEvent>,
    generation: AtomicU64,
}

impl Shared {
    /// Publish a tick for `generation`. Returns false if the run is stale.
    fn publish(&self, generation: u64, remaining: u32) -> bool {
        let mut current = true;
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                current = false;
                return false;
            }
            state.remaining_seconds = remaining;
            state.is_running = remaining > 0;
            true
        });
        if !current {
            return false;
        }

        let _ = self.events.send(CountdownEvent::Tick { remaining });
        if remaining == 0 {
            tracing::debug!("Countdown expired");
            let _ = self.events.send(CountdownEvent::Expired);
        }
        true
    }
}

#[derive(Debug)]
pub struct Countdown {
    shared: Arc<Shared>,
    run: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(CountdownState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state,
                events,
                generation: AtomicU64::new(0),
            }),
            run: Mutex::new(None),
        }
    }

    /// Start counting down from `duration_secs`, replacing any current run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, duration_secs: u32) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = run.take() {
            previous.abort();
        }

        let mut generation = 0;
        self.shared.state.send_modify(|state| {
            generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.remaining_seconds = duration_secs;
            state.is_running = duration_secs > 0;
        });
        tracing::debug!(duration_secs, "Countdown started");

        if duration_secs == 0 {
            let _ = self.shared.events.send(CountdownEvent::Expired);
            return;
        }

        let shared = Arc::clone(&self.shared);
        *run = Some(tokio::spawn(tick_down(shared, generation, duration_secs)));
    }

    /// Stop ticking. Idempotent; the remaining time is kept.
    pub fn cancel(&self) {
        let Some(handle) = self
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        handle.abort();

        let stopped = self.shared.state.send_if_modified(|state| {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            let was_running = state.is_running;
            state.is_running = false;
            was_running
        });
        if stopped {
            tracing::debug!("Countdown cancelled");
        }
    }

    #[must_use]
    pub fn state(&self) -> CountdownState {
        *self.shared.state.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state.borrow().is_running
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.shared.state.borrow().remaining_seconds
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<CountdownEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn tick_down(shared: Arc<Shared>, generation: u64, duration_secs: u32) {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut remaining = duration_secs;
    while remaining > 0 {
        ticker.tick().await;
        remaining -= 1;
        if !shared.publish(generation, remaining) {
            return;
        }
    }
}
