//! Post-tick invariant checks.
//!
//! Violations are soft failures: the engine logs them and keeps ticking, so
//! downstream consumers keep receiving snapshots even when a drift is
//! detected.

use thiserror::Error;

use crate::sim::simulator::DT_HOURS;
use crate::sim::types::TickState;

/// Absolute tolerance for the credits and energy-balance checks (kWh).
pub const BALANCE_TOLERANCE_KWH: f64 = 0.01;

/// SOC bound slack to absorb floating-point accumulation (kWh).
const SOC_TOLERANCE_KWH: f64 = 1e-6;

/// A physical or accounting invariant broken by a completed tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("{home}: SOC out of bounds: {soc_pct:.1}%")]
    SocOutOfBounds { home: String, soc_pct: f64 },

    #[error("{home}: negative power flow detected")]
    NegativeFlow { home: String },

    #[error("credits not conserved: {total_kwh:.4} kWh")]
    CreditsNotConserved { total_kwh: f64 },

    #[error("energy balance off: {delta_kwh:.4} kWh")]
    EnergyImbalance { delta_kwh: f64 },
}

/// Checks SOC bounds, flow signs, credit conservation, and the per-tick
/// energy balance. Returns every violation found, most specific first.
pub fn validate_tick(state: &TickState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for home in &state.homes {
        if home.soc_kwh < -SOC_TOLERANCE_KWH
            || home.soc_kwh > home.battery_capacity_kwh + SOC_TOLERANCE_KWH
        {
            violations.push(InvariantViolation::SocOutOfBounds {
                home: home.id.clone(),
                soc_pct: home.soc_pct(),
            });
        }
        let flows = [
            home.pv_kw,
            home.load_kw,
            home.charge_kw,
            home.discharge_kw,
            home.share_kw,
            home.recv_kw,
            home.grid_in_kw,
            home.grid_out_kw,
        ];
        if flows.iter().any(|&kw| kw < 0.0) {
            violations.push(InvariantViolation::NegativeFlow {
                home: home.id.clone(),
            });
        }
    }

    let total_credits: f64 = state.homes.iter().map(|h| h.credits_delta_kwh).sum();
    if total_credits.abs() > BALANCE_TOLERANCE_KWH {
        violations.push(InvariantViolation::CreditsNotConserved {
            total_kwh: total_credits,
        });
    }

    // Source and sink totals must match to within tolerance. Curtailed or
    // unserved energy during an outage surfaces here as a mismatch, which
    // the engine logs and rides through.
    let sources: f64 = state
        .homes
        .iter()
        .map(|h| (h.pv_kw + h.discharge_kw + h.recv_kw + h.grid_in_kw) * DT_HOURS)
        .sum();
    let sinks: f64 = state
        .homes
        .iter()
        .map(|h| (h.load_kw + h.charge_kw + h.share_kw + h.grid_out_kw) * DT_HOURS)
        .sum();
    if (sources - sinks).abs() > BALANCE_TOLERANCE_KWH {
        violations.push(InvariantViolation::EnergyImbalance {
            delta_kwh: sources - sinks,
        });
    }

    violations
}
