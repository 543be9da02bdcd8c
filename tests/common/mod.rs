//! Shared test fixtures for integration tests.

use chrono::NaiveDateTime;
use microgrid_sim::config::{
    EventKind, EventParams, HomeSpec, MicrogridConfig, ScenarioConfig, SimulationEvent,
};
use microgrid_sim::sim::clock::default_start;
use microgrid_sim::sim::types::HomeState;

/// A single-home spec matching the largest default roster entry.
pub fn single_home_spec() -> HomeSpec {
    HomeSpec {
        id: "H1".to_string(),
        pv_kwp: 8.0,
        battery_kwh: 13.5,
        scale: 1.0,
        critical: false,
    }
}

/// Runtime state for the single-home spec (SOC starts at 6.75 kWh).
pub fn single_home() -> HomeState {
    HomeState::from_spec(&single_home_spec())
}

/// A scenario whose roster is exactly the given homes, seed 42.
pub fn scenario_with_homes(homes: Vec<HomeSpec>) -> ScenarioConfig {
    ScenarioConfig {
        homes,
        ..ScenarioConfig::default()
    }
}

/// Config carrying a single event active over `[start, end)`.
pub fn config_with_event(kind: EventKind, start: u32, end: u32) -> MicrogridConfig {
    MicrogridConfig {
        events: vec![SimulationEvent {
            kind,
            start_minute: start,
            end_minute: end,
            params: EventParams::default(),
        }],
        ..MicrogridConfig::default()
    }
}

/// Simulated timestamp at the given minute of the first day.
pub fn at_minute(minute: u32) -> NaiveDateTime {
    default_start() + chrono::Duration::minutes(i64::from(minute))
}
