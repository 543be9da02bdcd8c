//! Daily energy accumulation over tick snapshots.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::sim::simulator::DT_HOURS;
use crate::sim::types::TickState;

/// Per-home accumulated energy for one simulated calendar date (kWh).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeRollup {
    pub id: String,
    pub produced_kwh: f64,
    pub consumed_kwh: f64,
    pub shared_kwh: f64,
    pub received_kwh: f64,
    pub credits_net_kwh: f64,
}

/// Community and per-home energy totals for one simulated calendar date.
///
/// A rollup is replaced, never merged, when the date changes; every tick
/// folds in as `kWh += kW * 1/60`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub production_kwh: f64,
    pub microgrid_used_kwh: f64,
    pub grid_import_kwh: f64,
    pub grid_export_kwh: f64,
    pub unserved_kwh: f64,
    pub homes: Vec<HomeRollup>,
}

impl DailyRollup {
    /// Creates a zeroed rollup for `date` with one row per home in `state`.
    pub fn new(date: NaiveDate, state: &TickState) -> Self {
        Self {
            date,
            production_kwh: 0.0,
            microgrid_used_kwh: 0.0,
            grid_import_kwh: 0.0,
            grid_export_kwh: 0.0,
            unserved_kwh: 0.0,
            homes: state
                .homes
                .iter()
                .map(|h| HomeRollup {
                    id: h.id.clone(),
                    produced_kwh: 0.0,
                    consumed_kwh: 0.0,
                    shared_kwh: 0.0,
                    received_kwh: 0.0,
                    credits_net_kwh: 0.0,
                })
                .collect(),
        }
    }

    /// Folds one tick's instantaneous flows into the daily totals.
    pub fn accumulate(&mut self, state: &TickState) {
        self.production_kwh += state.community.production_kw * DT_HOURS;
        self.microgrid_used_kwh += state.community.microgrid_used_kw * DT_HOURS;
        self.grid_import_kwh += state.community.grid_import_kw * DT_HOURS;
        self.grid_export_kwh += state.community.grid_export_kw * DT_HOURS;
        self.unserved_kwh += state.community.unserved_kw * DT_HOURS;

        for (home, rollup) in state.homes.iter().zip(self.homes.iter_mut()) {
            rollup.produced_kwh += home.pv_kw * DT_HOURS;
            rollup.consumed_kwh += home.load_kw * DT_HOURS;
            rollup.shared_kwh += home.share_kw * DT_HOURS;
            rollup.received_kwh += home.recv_kw * DT_HOURS;
            rollup.credits_net_kwh += home.credits_delta_kwh;
        }
    }
}

impl fmt::Display for DailyRollup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Daily Rollup ({}) ---", self.date)?;
        writeln!(f, "Production:       {:.2} kWh", self.production_kwh)?;
        writeln!(f, "Microgrid used:   {:.2} kWh", self.microgrid_used_kwh)?;
        writeln!(f, "Grid import:      {:.2} kWh", self.grid_import_kwh)?;
        writeln!(f, "Grid export:      {:.2} kWh", self.grid_export_kwh)?;
        write!(f, "Unserved:         {:.2} kWh", self.unserved_kwh)
    }
}
