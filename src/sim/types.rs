//! Core simulation state types: homes, community totals, and tick snapshots.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::HomeSpec;

/// Battery/pool behavior knobs attached to each home.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomePolicy {
    /// Whether the battery may discharge to cover ordinary load.
    pub allow_discharge: bool,
    /// Daytime SOC target as a fraction of capacity; PV charging stops here.
    pub day_soc_target_pct: f64,
    /// Marks a home whose unmet demand matters most during outages.
    pub critical: bool,
}

/// Full per-home state: static configuration, persistent SOC/credit state,
/// and the telemetry fields the simulator rewrites every tick.
///
/// Invariants maintained by the dispatch pipeline: `0 <= soc_kwh <=
/// battery_capacity_kwh`, and every instantaneous flow field is
/// non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeState {
    pub id: String,
    /// PV nameplate capacity (kWp).
    pub pv_size_kwp: f64,
    /// Load scale factor relative to the normalized curve.
    pub household_scale: f64,
    /// Battery capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// Maximum charging power (kW, positive).
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW, positive).
    pub max_discharge_kw: f64,
    /// SOC fraction below which the battery will not discharge for load.
    pub reserve_floor_pct: f64,
    pub policy: HomePolicy,

    /// Battery state of charge (kWh).
    pub soc_kwh: f64,
    /// Cumulative net contribution to the pool (kWh, zero-sum across homes).
    pub credits_balance_kwh: f64,

    // Per-tick telemetry, rewritten on every dispatch.
    pub pv_kw: f64,
    pub load_kw: f64,
    pub charge_kw: f64,
    pub discharge_kw: f64,
    pub share_kw: f64,
    pub recv_kw: f64,
    pub grid_in_kw: f64,
    pub grid_out_kw: f64,
    pub credits_delta_kwh: f64,
}

impl HomeState {
    /// Builds the runtime state for one roster entry.
    ///
    /// Charge and discharge rates derive as 0.5C from battery capacity, the
    /// reserve floor is 20%, the daytime SOC target 90%, and the battery
    /// starts at 50% charge.
    ///
    /// # Panics
    ///
    /// Panics if the spec carries a non-positive battery capacity or scale,
    /// or negative PV capacity. [`crate::config::ScenarioConfig::validate`]
    /// rejects such specs before they reach this constructor.
    pub fn from_spec(spec: &HomeSpec) -> Self {
        assert!(spec.battery_kwh > 0.0);
        assert!(spec.scale > 0.0);
        assert!(spec.pv_kwp >= 0.0);

        Self {
            id: spec.id.clone(),
            pv_size_kwp: spec.pv_kwp,
            household_scale: spec.scale,
            battery_capacity_kwh: spec.battery_kwh,
            max_charge_kw: spec.battery_kwh * 0.5,
            max_discharge_kw: spec.battery_kwh * 0.5,
            reserve_floor_pct: 0.2,
            policy: HomePolicy {
                allow_discharge: true,
                day_soc_target_pct: 0.9,
                critical: spec.critical,
            },
            soc_kwh: spec.battery_kwh * 0.5,
            credits_balance_kwh: 0.0,
            pv_kw: 0.0,
            load_kw: 0.0,
            charge_kw: 0.0,
            discharge_kw: 0.0,
            share_kw: 0.0,
            recv_kw: 0.0,
            grid_in_kw: 0.0,
            grid_out_kw: 0.0,
            credits_delta_kwh: 0.0,
        }
    }

    /// SOC as a percentage of battery capacity.
    pub fn soc_pct(&self) -> f64 {
        (self.soc_kwh / self.battery_capacity_kwh) * 100.0
    }
}

/// Community-wide instantaneous totals for one tick (kW).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityTotals {
    /// Total PV production.
    pub production_kw: f64,
    /// Energy delivered through the pool (sum of receives).
    pub microgrid_used_kw: f64,
    pub grid_import_kw: f64,
    pub grid_export_kw: f64,
    /// Demand destroyed this tick (no source could cover it).
    pub unserved_kw: f64,
}

/// Immutable snapshot of one simulated minute.
///
/// Created fresh every tick: the home list is cloned at snapshot time, so
/// later mutation of the live roster never reaches into history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickState {
    pub timestamp: NaiveDateTime,
    /// Minute of day in [0, 1439].
    pub minute_of_day: u32,
    pub homes: Vec<HomeState>,
    pub community: CommunityTotals,
}
