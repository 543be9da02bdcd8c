//! Engine orchestrating the clock, simulator, history, and rollups.
//!
//! The engine interior lives behind a mutex shared with the clock's timer
//! task; one tick runs to completion inside a single lock acquisition, so
//! ticks never overlap and queries only ever observe completed snapshots.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::{
    AllocationPolicy, ConfigError, EventKind, EventParams, HomeSpec, MicrogridConfig,
    ScenarioConfig, SimulationEvent,
};
use crate::sim::clock::{SimMode, VirtualClock, default_start};
use crate::sim::rollup::DailyRollup;
use crate::sim::simulator::MicrogridSimulator;
use crate::sim::types::{HomeState, TickState};
use crate::sim::validate::validate_tick;
use crate::telemetry::TickDelta;

/// Tick history capacity: three simulated days of one-minute samples.
pub const HISTORY_LIMIT: usize = 3 * 24 * 60;

/// Broadcast buffer for slow delta subscribers.
const DELTA_CHANNEL_CAPACITY: usize = 256;

/// Everything the tick path mutates, kept together under one lock.
struct EngineInner {
    simulator: MicrogridSimulator,
    roster: Vec<HomeSpec>,
    homes: Vec<HomeState>,
    config: MicrogridConfig,
    history: VecDeque<TickState>,
    current: Option<TickState>,
    rollup: Option<DailyRollup>,
}

impl EngineInner {
    /// Runs one tick: simulate, fold into history and the daily rollup,
    /// build the outbound delta, and log any invariant violations.
    fn on_tick(&mut self, timestamp: NaiveDateTime, minute_of_day: u32) -> TickDelta {
        let state = self
            .simulator
            .tick(&mut self.homes, &self.config, timestamp, minute_of_day);

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(state.clone());

        let date = state.timestamp.date();
        if !matches!(&self.rollup, Some(r) if r.date == date) {
            self.rollup = Some(DailyRollup::new(date, &state));
        }
        if let Some(rollup) = self.rollup.as_mut() {
            rollup.accumulate(&state);
        }

        let delta = TickDelta::from_state(&state);

        for violation in validate_tick(&state) {
            warn!(minute_of_day, %violation, "invariant violation");
        }

        self.current = Some(state);
        delta
    }
}

/// Owns the home roster, config, bounded history, and daily rollup, and
/// drives the simulator from the virtual clock's per-minute callback.
///
/// Collaborators mutate through [`add_event`](Self::add_event),
/// [`update_policy`](Self::update_policy), and [`reset`](Self::reset), and
/// observe through snapshot queries or the broadcast delta stream.
pub struct MicrogridEngine {
    clock: VirtualClock,
    inner: Arc<Mutex<EngineInner>>,
    delta_tx: broadcast::Sender<TickDelta>,
}

impl MicrogridEngine {
    /// Creates an engine over the built-in 20-home neighborhood.
    pub fn new(seed: u64) -> Self {
        let mut scenario = ScenarioConfig::default();
        scenario.simulation.seed = seed;
        Self::from_scenario(&scenario)
    }

    /// Creates an engine from a validated scenario.
    ///
    /// # Panics
    ///
    /// Panics if the scenario carries invalid home specs; run
    /// [`ScenarioConfig::validate`] first.
    pub fn from_scenario(scenario: &ScenarioConfig) -> Self {
        let homes: Vec<HomeState> = scenario.homes.iter().map(HomeState::from_spec).collect();
        let (delta_tx, _) = broadcast::channel(DELTA_CHANNEL_CAPACITY);

        Self {
            clock: VirtualClock::new(default_start(), scenario.simulation.mode),
            inner: Arc::new(Mutex::new(EngineInner {
                simulator: MicrogridSimulator::new(scenario.simulation.seed),
                roster: scenario.homes.clone(),
                homes,
                config: scenario.microgrid_config(),
                history: VecDeque::with_capacity(HISTORY_LIMIT),
                current: None,
                rollup: None,
            })),
            delta_tx,
        }
    }

    /// Starts clock-driven ticking in the given mode.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, mode: SimMode) {
        self.clock.set_mode(mode);
        let inner = Arc::clone(&self.inner);
        let tx = self.delta_tx.clone();
        self.clock.start(move |timestamp, minute_of_day| {
            let delta = inner.lock().on_tick(timestamp, minute_of_day);
            // Nobody listening is fine; the send just drops.
            let _ = tx.send(delta);
        });
    }

    /// Pauses the clock; the in-flight tick (if any) completes first.
    pub fn pause(&mut self) {
        self.clock.pause();
    }

    /// Resumes clock-driven ticking after a pause.
    pub fn resume(&mut self) {
        self.clock.resume();
    }

    /// Runs one tick synchronously, without the timer, and returns its delta.
    ///
    /// Batch drivers and tests use this to advance as fast as the CPU allows.
    pub fn step(&mut self) -> TickDelta {
        let (timestamp, minute_of_day) = self.clock.step();
        let delta = self.inner.lock().on_tick(timestamp, minute_of_day);
        let _ = self.delta_tx.send(delta.clone());
        delta
    }

    /// Runs `minutes` ticks synchronously and returns their deltas.
    pub fn run_for(&mut self, minutes: usize) -> Vec<TickDelta> {
        (0..minutes).map(|_| self.step()).collect()
    }

    /// Injects an event starting at the current simulated minute.
    ///
    /// # Errors
    ///
    /// Rejects a zero duration before any state is touched.
    pub fn add_event(
        &mut self,
        kind: EventKind,
        duration_minutes: u32,
        params: Option<EventParams>,
    ) -> Result<(), ConfigError> {
        if duration_minutes == 0 {
            return Err(ConfigError::new(
                "event.duration_minutes",
                "must be a positive number of minutes",
            ));
        }

        let start_minute = self.clock.minute_of_day();
        let event = SimulationEvent {
            kind,
            start_minute,
            end_minute: start_minute + duration_minutes,
            params: params.unwrap_or_default(),
        };
        self.inner.lock().config.events.push(event);
        info!(%kind, duration_minutes, start_minute, "event added");
        Ok(())
    }

    /// Overwrites the allocation policy and, optionally, the fair rate.
    ///
    /// # Errors
    ///
    /// Rejects a negative fair rate before any state is touched.
    pub fn update_policy(
        &mut self,
        allocation: AllocationPolicy,
        fair_rate_cents: Option<f64>,
    ) -> Result<(), ConfigError> {
        if let Some(rate) = fair_rate_cents {
            if rate < 0.0 {
                return Err(ConfigError::new(
                    "policy.fair_rate_cents_per_kwh",
                    "must be >= 0",
                ));
            }
        }

        let mut inner = self.inner.lock();
        inner.config.allocation = allocation;
        if let Some(rate) = fair_rate_cents {
            inner.config.fair_rate_cents_per_kwh = rate;
        }
        info!(
            ?allocation,
            fair_rate_cents = inner.config.fair_rate_cents_per_kwh,
            "policy updated"
        );
        Ok(())
    }

    /// Reinitializes the clock, noise stream, and roster, and clears all
    /// accumulated state. Injected events survive, matching the append-only
    /// event contract; stale windows simply stop matching.
    pub fn reset(&mut self, seed: u64, mode: SimMode) {
        self.clock.reset(default_start(), mode);
        let mut inner = self.inner.lock();
        inner.simulator.reset(seed);
        let homes: Vec<HomeState> = inner.roster.iter().map(HomeState::from_spec).collect();
        inner.homes = homes;
        inner.history.clear();
        inner.current = None;
        inner.rollup = None;
        info!(seed, ?mode, "engine reset");
    }

    /// Latest completed tick snapshot; `None` before the first tick.
    pub fn current_state(&self) -> Option<TickState> {
        self.inner.lock().current.clone()
    }

    /// Today's accumulated rollup; `None` before the first tick.
    pub fn daily_rollup(&self) -> Option<DailyRollup> {
        self.inner.lock().rollup.clone()
    }

    /// Read-only view of the live roster.
    pub fn homes(&self) -> Vec<HomeState> {
        self.inner.lock().homes.clone()
    }

    /// Read-only view of the live config, injected events included.
    pub fn config(&self) -> MicrogridConfig {
        self.inner.lock().config.clone()
    }

    /// Number of ticks currently retained.
    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    /// Copies the retained tick history, oldest first.
    pub fn history_snapshot(&self) -> Vec<TickState> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Subscribes to the per-tick delta stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TickDelta> {
        self.delta_tx.subscribe()
    }

    /// Current simulated time.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// `true` while the clock has a timer scheduled.
    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }
}
