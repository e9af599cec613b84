//! Draft clock
//!
//! [`DraftClock`] is the pure state machine (`Stopped` / `Running`), driven by
//! explicit timestamps. [`ClockEngine`] owns one instance per draft, reads
//! time, runs the one-second ticker and publishes every transition.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{DraftEvent, Publisher};

/// Default pick duration: two minutes
pub const DEFAULT_DURATION_MS: u64 = 2 * 60 * 1000;

/// Longest pick duration a client may set: one day
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// Cadence of the expiry check while running
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Full clock state, broadcast on every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub owner_id: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub is_running: bool,
}

impl ClockState {
    pub fn stopped(duration_ms: u64) -> Self {
        Self {
            owner_id: None,
            end_time: None,
            duration_ms,
            is_running: false,
        }
    }
}

/// Why a clock request changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSkip {
    /// Duration can only change while stopped
    Running,
    /// Duration must be a positive number of minutes, at most one day
    InvalidDuration,
}

/// Result of a clock request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockOutcome {
    /// Transitions applied, in publication order
    Changed(Vec<ClockState>),
    Ignored(ClockSkip),
}

/// Clock state machine without any notion of real time
#[derive(Debug, Clone)]
pub struct DraftClock {
    state: ClockState,
}

impl DraftClock {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            state: ClockState::stopped(duration_ms),
        }
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    /// Start the countdown for `owner_id`. A running countdown is stopped
    /// first, so the result holds either `[running]` or `[stopped, running]`.
    pub fn start(&mut self, owner_id: String, now: DateTime<Utc>) -> Vec<ClockState> {
        let mut transitions = Vec::with_capacity(2);
        if self.state.is_running {
            transitions.push(self.stop());
        }

        let duration_ms = self.state.duration_ms.min(MAX_DURATION_MS);
        let end_time = now
            .checked_add_signed(chrono::Duration::milliseconds(duration_ms as i64))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.state.owner_id = Some(owner_id);
        self.state.end_time = Some(end_time);
        self.state.is_running = true;
        transitions.push(self.state.clone());
        transitions
    }

    /// Stop from any state
    pub fn stop(&mut self) -> ClockState {
        self.state = ClockState::stopped(self.state.duration_ms);
        self.state.clone()
    }

    /// Expire the countdown if `now` has reached the end time
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<ClockState> {
        match self.state.end_time {
            Some(end_time) if self.state.is_running && now >= end_time => Some(self.stop()),
            _ => None,
        }
    }

    /// Change the pick duration. Only allowed while stopped.
    pub fn set_duration(&mut self, minutes: f64) -> Result<ClockState, ClockSkip> {
        if self.state.is_running {
            return Err(ClockSkip::Running);
        }
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(ClockSkip::InvalidDuration);
        }
        let duration_ms = (minutes * 60_000.0).round();
        if duration_ms < 1.0 || duration_ms > MAX_DURATION_MS as f64 {
            return Err(ClockSkip::InvalidDuration);
        }
        self.state.duration_ms = duration_ms as u64;
        Ok(self.state.clone())
    }
}

/// Wall-clock time that advances with the monotonic clock
#[derive(Debug, Clone, Copy)]
struct MonotonicTime {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicTime {
    fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}

struct EngineInner {
    clock: DraftClock,
    /// Bumped on every stop/start so a superseded ticker stays inert
    generation: u64,
    ticker: Option<JoinHandle<()>>,
}

impl EngineInner {
    fn cancel_ticker(&mut self) {
        self.generation += 1;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// The single shared draft clock
pub struct ClockEngine {
    inner: Mutex<EngineInner>,
    publisher: Arc<dyn Publisher>,
    time: MonotonicTime,
}

impl ClockEngine {
    pub fn new(duration_ms: u64, publisher: Arc<dyn Publisher>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EngineInner {
                clock: DraftClock::new(duration_ms),
                generation: 0,
                ticker: None,
            }),
            publisher,
            time: MonotonicTime::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &ClockState) {
        self.publisher.publish(DraftEvent::ClockUpdate(state.clone()));
    }

    /// Current clock state
    pub fn state(&self) -> ClockState {
        self.lock().clock.state().clone()
    }

    /// Start the countdown for `owner_id`, preempting any running countdown
    pub fn start(self: &Arc<Self>, owner_id: impl Into<String>) -> ClockOutcome {
        let owner_id = owner_id.into();
        let mut inner = self.lock();

        inner.cancel_ticker();
        let transitions = inner.clock.start(owner_id.clone(), self.time.now());
        for state in &transitions {
            self.publish(state);
        }

        let generation = inner.generation;
        inner.ticker = self.spawn_ticker(generation);
        info!(owner_id = %owner_id, "Draft clock started");
        ClockOutcome::Changed(transitions)
    }

    /// Stop the countdown. Publishes even when already stopped.
    pub fn stop(&self) -> ClockState {
        let mut inner = self.lock();
        inner.cancel_ticker();
        let state = inner.clock.stop();
        self.publish(&state);
        debug!("Draft clock stopped");
        state
    }

    /// Change the pick duration; ignored while running or for non-positive input
    pub fn set_duration(&self, minutes: f64) -> ClockOutcome {
        let mut inner = self.lock();
        match inner.clock.set_duration(minutes) {
            Ok(state) => {
                self.publish(&state);
                info!(minutes, "Draft clock duration changed");
                ClockOutcome::Changed(vec![state])
            }
            Err(skip) => {
                debug!(?skip, minutes, "Ignoring duration change");
                ClockOutcome::Ignored(skip)
            }
        }
    }

    /// One expiry check. Returns whether the ticker should keep running.
    fn tick(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.clock.is_running() {
            return false;
        }

        let owner_id = inner.clock.state().owner_id.clone();
        match inner.clock.tick(self.time.now()) {
            Some(state) => {
                info!(owner_id = ?owner_id, "Draft clock expired");
                inner.generation += 1;
                inner.ticker = None;
                self.publish(&state);
                false
            }
            None => true,
        }
    }

    fn spawn_ticker(self: &Arc<Self>, generation: u64) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available; the draft clock will not expire on its own");
            return None;
        };

        let engine = Arc::downgrade(self);
        Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if !engine.tick(generation) {
                    break;
                }
            }
        }))
    }
}

impl Drop for ClockEngine {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if let Some(ticker) = inner.ticker.take() {
                ticker.abort();
            }
        }
    }
}
