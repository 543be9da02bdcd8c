//! Per-minute physics and allocation engine.
//!
//! [`MicrogridSimulator::tick`] runs the full dispatch pipeline for one
//! simulated minute: PV/load synthesis with seeded noise, self-use, battery
//! charge/discharge, community pool allocation, grid settlement, and credit
//! accounting. The simulator owns no long-lived state except its noise
//! generator; homes and config arrive by reference each tick.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::MicrogridConfig;
use crate::profiles::{self, LOAD_CURVE, PV_CURVE};
use crate::sim::types::{CommunityTotals, HomeState, TickState};

/// One simulated minute in hours.
pub const DT_HOURS: f64 = 1.0 / 60.0;

/// Power comparisons below this threshold (kW) are treated as zero.
pub const EPSILON: f64 = 0.001;

/// Battery charge efficiency.
const ETA_CHARGE: f64 = 0.95;

/// Battery discharge efficiency.
const ETA_DISCHARGE: f64 = 0.95;

/// Surplus energy one home offers to the pool this tick.
struct PoolOffer {
    home: usize,
    available_kwh: f64,
}

/// Deficit energy one home asks of the pool this tick.
struct PoolNeed {
    home: usize,
    need_kwh: f64,
}

/// Per-home pool outcome for one tick (kWh).
#[derive(Debug, Clone, Copy, Default)]
struct PoolAllocation {
    share_kwh: f64,
    recv_kwh: f64,
}

/// Stateless-per-call dispatch engine with an owned, reseedable noise RNG.
pub struct MicrogridSimulator {
    rng: StdRng,
}

impl MicrogridSimulator {
    /// Creates a simulator with a deterministically seeded noise generator.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Reseeds the noise generator, restarting the deterministic stream.
    pub fn reset(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Runs one simulated minute of dispatch across all homes.
    ///
    /// Mutates each home's telemetry, SOC, and credit balance in place and
    /// returns a fresh snapshot. Purely computational; cannot fail under
    /// valid home state.
    pub fn tick(
        &mut self,
        homes: &mut [HomeState],
        config: &MicrogridConfig,
        timestamp: NaiveDateTime,
        minute_of_day: u32,
    ) -> TickState {
        let hour = ((minute_of_day / 60) % 24) as usize;

        let weather_mult = profiles::weather_multiplier(minute_of_day, &config.events);
        let heat_mult = profiles::heatwave_multiplier(minute_of_day, &config.events);
        let ev_surge = profiles::ev_surge_kw(minute_of_day, &config.events);
        let grid_available = profiles::is_grid_available(minute_of_day, &config.events);

        let mut offers: Vec<PoolOffer> = Vec::new();
        let mut needs: Vec<PoolNeed> = Vec::new();

        for (i, home) in homes.iter_mut().enumerate() {
            // One noise draw per home per tick, shared by PV and load.
            let noise = (self.rng.random::<f64>() - 0.5) * 0.1;
            home.pv_kw =
                (PV_CURVE[hour] * home.pv_size_kwp * weather_mult * (1.0 + noise)).max(0.0);
            home.load_kw = (LOAD_CURVE[hour] * home.household_scale * heat_mult * (1.0 + noise)
                + ev_surge)
                .max(0.0);

            let self_use_kw = home.pv_kw.min(home.load_kw);
            let mut rem_pv_kw = home.pv_kw - self_use_kw;
            let mut rem_load_kw = home.load_kw - self_use_kw;

            // Charge from excess PV, stopping at the daytime SOC target.
            home.charge_kw = 0.0;
            if rem_pv_kw > EPSILON {
                let target_kwh = home.policy.day_soc_target_pct * home.battery_capacity_kwh;
                let room_kwh = (target_kwh - home.soc_kwh)
                    .min(home.max_charge_kw * DT_HOURS)
                    .max(0.0);
                let charge_kwh = (rem_pv_kw * DT_HOURS).min(room_kwh) * ETA_CHARGE;
                home.soc_kwh = (home.soc_kwh + charge_kwh).min(home.battery_capacity_kwh);
                home.charge_kw = charge_kwh / DT_HOURS;
                rem_pv_kw -= home.charge_kw;
            }

            // Discharge toward the deficit, never below the reserve floor.
            home.discharge_kw = 0.0;
            if rem_load_kw > EPSILON && home.policy.allow_discharge {
                let reserve_kwh = home.reserve_floor_pct * home.battery_capacity_kwh;
                let available_kwh = (home.soc_kwh - reserve_kwh).max(0.0);
                let dis_kwh = (rem_load_kw * DT_HOURS)
                    .min(home.max_discharge_kw * DT_HOURS)
                    .min(available_kwh)
                    / ETA_DISCHARGE;
                home.soc_kwh = (home.soc_kwh - dis_kwh * ETA_DISCHARGE).max(0.0);
                home.discharge_kw = dis_kwh / DT_HOURS;
                rem_load_kw -= home.discharge_kw;
            }

            // Leftovers become this tick's pool offer or need.
            if rem_pv_kw > EPSILON {
                offers.push(PoolOffer {
                    home: i,
                    available_kwh: rem_pv_kw * DT_HOURS,
                });
            }
            if rem_load_kw > EPSILON {
                needs.push(PoolNeed {
                    home: i,
                    need_kwh: rem_load_kw * DT_HOURS,
                });
            }
        }

        let allocations = allocate_pool(&offers, &needs, homes.len(), config);

        let mut community = CommunityTotals::default();

        for (i, home) in homes.iter_mut().enumerate() {
            let alloc = allocations.get(i).copied().unwrap_or_default();
            home.share_kw = alloc.share_kwh / DT_HOURS;
            home.recv_kw = alloc.recv_kwh / DT_HOURS;

            let surplus = home.pv_kw - home.load_kw - home.charge_kw + home.discharge_kw
                - home.share_kw
                + home.recv_kw;

            if surplus > EPSILON {
                // Leftover generation exports, or is curtailed during an
                // outage (dropped, counted nowhere).
                home.grid_out_kw = if grid_available { surplus } else { 0.0 };
                home.grid_in_kw = 0.0;
            } else if surplus < -EPSILON {
                let need = -surplus;
                if grid_available {
                    home.grid_in_kw = need;
                    home.grid_out_kw = 0.0;
                } else {
                    // Demand destruction: never retried or queued.
                    home.grid_in_kw = 0.0;
                    home.grid_out_kw = 0.0;
                    community.unserved_kw += need;
                }
            } else {
                home.grid_in_kw = 0.0;
                home.grid_out_kw = 0.0;
            }

            home.credits_delta_kwh = (home.share_kw - home.recv_kw) * DT_HOURS;
            home.credits_balance_kwh += home.credits_delta_kwh;

            community.production_kw += home.pv_kw;
            community.microgrid_used_kw += home.recv_kw;
            community.grid_import_kw += home.grid_in_kw;
            community.grid_export_kw += home.grid_out_kw;
        }

        TickState {
            timestamp,
            minute_of_day,
            homes: homes.to_vec(),
            community,
        }
    }
}

/// Dispatches to the configured allocation policy.
///
/// `need` and `cap` are accepted but not yet distinguished; every policy
/// currently runs the equal-share routine.
fn allocate_pool(
    offers: &[PoolOffer],
    needs: &[PoolNeed],
    n_homes: usize,
    config: &MicrogridConfig,
) -> Vec<PoolAllocation> {
    use crate::config::AllocationPolicy::{Cap, Equal, Need};
    match config.allocation {
        Equal | Need | Cap => equal_share(offers, needs, n_homes),
    }
}

/// Equal-share pool allocation.
///
/// Each consumer receives `min(need, POOL * need/NEED)`; if floating drift
/// pushes the total past POOL, every allocation is scaled down uniformly so
/// the total matches POOL exactly. Providers are drawn down proportionally
/// to their offered share: the pool is one fungible resource, not
/// point-to-point routing.
fn equal_share(offers: &[PoolOffer], needs: &[PoolNeed], n_homes: usize) -> Vec<PoolAllocation> {
    let mut allocations = vec![PoolAllocation::default(); n_homes];

    let pool: f64 = offers.iter().map(|o| o.available_kwh).sum();
    let total_need: f64 = needs.iter().map(|n| n.need_kwh).sum();

    if pool < EPSILON || total_need < EPSILON {
        return allocations;
    }

    let mut total_allocated = 0.0;
    for need in needs {
        let alloc = need.need_kwh.min(pool * (need.need_kwh / total_need));
        allocations[need.home].recv_kwh = alloc;
        total_allocated += alloc;
    }

    if total_allocated > pool {
        let scale = pool / total_allocated;
        for need in needs {
            allocations[need.home].recv_kwh *= scale;
        }
        total_allocated = pool;
    }

    for offer in offers {
        allocations[offer.home].share_kwh = (offer.available_kwh / pool) * total_allocated;
    }

    allocations
}
