//! Virtual clock: advances simulated time by one-minute ticks on a
//! real-time-decoupled schedule.
//!
//! The clock owns a single repeating tokio task; pausing aborts it, resuming
//! respawns it, so at most one timer is ever pending. The task is cancelled
//! only at its sleep point, never while the tick callback is running.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Real-time-to-simulated-time ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimMode {
    /// One simulated minute per real minute (1:1).
    Realtime,
    /// One simulated minute per 500 ms of real time (120:1).
    #[default]
    Accelerated,
}

impl SimMode {
    /// Real delay between consecutive ticks.
    pub fn tick_interval(self) -> Duration {
        match self {
            Self::Realtime => Duration::from_millis(60_000),
            Self::Accelerated => Duration::from_millis(500),
        }
    }
}

/// Clock lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Running,
    Paused,
}

/// Callback invoked once per simulated minute with the advanced timestamp
/// and its minute of day.
pub type TickCallback = Box<dyn FnMut(NaiveDateTime, u32) + Send>;

struct Shared {
    current: NaiveDateTime,
    mode: SimMode,
}

impl Shared {
    /// Advances simulated time by exactly one minute.
    fn advance(&mut self) -> (NaiveDateTime, u32) {
        self.current += chrono::Duration::minutes(1);
        (self.current, minute_of_day(self.current))
    }
}

/// Manages simulated time for the engine.
///
/// State machine: Stopped → `start` → Running ⇄ (`pause`/`resume`) Paused.
/// `reset` pauses before reinitializing, and `set_mode` swaps the tick
/// ratio without touching simulated time.
pub struct VirtualClock {
    shared: Arc<Mutex<Shared>>,
    run_state: RunState,
    callback: Option<Arc<Mutex<TickCallback>>>,
    timer: Option<JoinHandle<()>>,
}

impl VirtualClock {
    /// Creates a stopped clock at the given simulated start time.
    pub fn new(start: NaiveDateTime, mode: SimMode) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared { current: start, mode })),
            run_state: RunState::Stopped,
            callback: None,
            timer: None,
        }
    }

    /// Registers the tick callback and starts ticking.
    ///
    /// Any previously pending timer is cancelled first, so repeated calls
    /// never leave more than one timer scheduled. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self, callback: impl FnMut(NaiveDateTime, u32) + Send + 'static) {
        self.cancel_timer();
        let callback: TickCallback = Box::new(callback);
        self.callback = Some(Arc::new(Mutex::new(callback)));
        self.run_state = RunState::Running;
        self.spawn_timer();
    }

    /// Cancels any pending tick and transitions to Paused. Idempotent.
    pub fn pause(&mut self) {
        self.cancel_timer();
        self.run_state = RunState::Paused;
    }

    /// Reschedules ticking if the clock is paused and a callback is
    /// registered; otherwise does nothing.
    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused && self.callback.is_some() {
            self.run_state = RunState::Running;
            self.spawn_timer();
        }
    }

    /// Cancels pending work and reinitializes simulated time and mode.
    ///
    /// Leaves the clock paused; callers that want ticking to continue call
    /// [`resume`](Self::resume) afterwards.
    pub fn reset(&mut self, start: NaiveDateTime, mode: SimMode) {
        self.pause();
        let mut shared = self.shared.lock();
        shared.current = start;
        shared.mode = mode;
    }

    /// Changes the tick ratio without resetting simulated time.
    ///
    /// A running clock is paused around the swap and resumed afterwards.
    pub fn set_mode(&mut self, mode: SimMode) {
        let was_running = self.run_state == RunState::Running;
        if was_running {
            self.pause();
        }
        self.shared.lock().mode = mode;
        if was_running {
            self.resume();
        }
    }

    /// Advances simulated time by one minute without any timer involved.
    ///
    /// Batch drivers use this to run the engine as fast as the CPU allows;
    /// the registered callback (if any) is not invoked.
    pub fn step(&mut self) -> (NaiveDateTime, u32) {
        self.shared.lock().advance()
    }

    /// Current simulated time (a copy).
    pub fn now(&self) -> NaiveDateTime {
        self.shared.lock().current
    }

    /// Minute of day of the simulated time, in [0, 1439].
    pub fn minute_of_day(&self) -> u32 {
        minute_of_day(self.shared.lock().current)
    }

    /// Current tick ratio.
    pub fn mode(&self) -> SimMode {
        self.shared.lock().mode
    }

    /// `true` while a timer is scheduled.
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn spawn_timer(&mut self) {
        let Some(callback) = self.callback.clone() else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        self.timer = Some(tokio::spawn(async move {
            loop {
                let interval = shared.lock().mode.tick_interval();
                tokio::time::sleep(interval).await;
                let (now, minute) = shared.lock().advance();
                let mut cb = callback.lock();
                (*cb)(now, minute);
            }
        }));
    }
}

impl Drop for VirtualClock {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

/// Minute of day derived from the local hour and minute of `ts`.
pub fn minute_of_day(ts: NaiveDateTime) -> u32 {
    ts.hour() * 60 + ts.minute()
}

/// Fixed simulated epoch shared by engine construction and reset.
pub fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 4)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}
