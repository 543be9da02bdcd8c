//! Hourly generation/consumption shape tables and event modifiers.
//!
//! The curves are normalized to [0, 1] and indexed by hour of day; homes
//! scale them by nameplate capacity and household size. The modifier
//! functions are pure: they inspect the active event list and return the
//! multiplier (or additive term) to apply this minute.

use crate::config::{EventKind, SimulationEvent};

/// Bell-shaped PV output curve, zero at night, peak 1.0 at noon.
pub const PV_CURVE: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, // 0-5: night
    0.05, 0.15, 0.35, 0.60, 0.80, 0.95, // 6-11: sunrise to noon
    1.0, 0.95, 0.80, 0.60, 0.35, 0.15, // 12-17: noon to sunset
    0.05, 0.0, 0.0, 0.0, 0.0, 0.0, // 18-23: evening to night
];

/// Household load curve: low overnight, morning bump, evening peak at 19:00.
pub const LOAD_CURVE: [f64; 24] = [
    0.3, 0.25, 0.25, 0.25, 0.3, 0.35, // 0-5: night (low)
    0.6, 0.8, 0.7, 0.5, 0.45, 0.4, // 6-11: morning bump
    0.4, 0.4, 0.45, 0.5, 0.6, 0.75, // 12-17: afternoon rise
    0.95, 1.0, 0.95, 0.85, 0.7, 0.5, // 18-23: evening peak
];

/// PV attenuation applied during a cloudburst when no override is given.
pub const DEFAULT_CLOUDBURST_PV_MULT: f64 = 0.4;

/// Load amplification applied during a heatwave when no override is given.
pub const DEFAULT_HEATWAVE_LOAD_MULT: f64 = 1.15;

/// Extra charging demand per home during an EV surge, in kW.
pub const DEFAULT_EV_SURGE_KW: f64 = 3.0;

/// PV multiplier for the given minute: the first active CLOUDBURST wins,
/// otherwise 1.0. Overlapping cloudbursts do not stack.
pub fn weather_multiplier(minute_of_day: u32, events: &[SimulationEvent]) -> f64 {
    events
        .iter()
        .find(|e| e.kind == EventKind::Cloudburst && e.is_active(minute_of_day))
        .map_or(1.0, |e| {
            e.params.pv_multiplier.unwrap_or(DEFAULT_CLOUDBURST_PV_MULT)
        })
}

/// Load multiplier for the given minute: the first active HEATWAVE wins,
/// otherwise 1.0.
pub fn heatwave_multiplier(minute_of_day: u32, events: &[SimulationEvent]) -> f64 {
    events
        .iter()
        .find(|e| e.kind == EventKind::Heatwave && e.is_active(minute_of_day))
        .map_or(1.0, |e| {
            e.params.load_multiplier.unwrap_or(DEFAULT_HEATWAVE_LOAD_MULT)
        })
}

/// Additive EV charging demand in kW. Non-zero only while an EV_SURGE event
/// is active AND the local hour falls in the 19:00-23:59 charging window.
pub fn ev_surge_kw(minute_of_day: u32, events: &[SimulationEvent]) -> f64 {
    let hour = (minute_of_day / 60) % 24;
    if !(19..=23).contains(&hour) {
        return 0.0;
    }
    events
        .iter()
        .find(|e| e.kind == EventKind::EvSurge && e.is_active(minute_of_day))
        .map_or(0.0, |e| e.params.ev_surge_kw.unwrap_or(DEFAULT_EV_SURGE_KW))
}

/// Returns `false` while an OUTAGE event covers the given minute.
pub fn is_grid_available(minute_of_day: u32, events: &[SimulationEvent]) -> bool {
    !events
        .iter()
        .any(|e| e.kind == EventKind::Outage && e.is_active(minute_of_day))
}
