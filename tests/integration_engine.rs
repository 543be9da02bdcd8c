//! Full-day engine runs: physical bounds, conservation, determinism, and
//! history/rollup bookkeeping.

mod common;

use chrono::Datelike;
use microgrid_sim::sim::clock::{SimMode, default_start};
use microgrid_sim::sim::engine::{HISTORY_LIMIT, MicrogridEngine};
use microgrid_sim::sim::simulator::DT_HOURS;
use microgrid_sim::sim::validate::validate_tick;

#[test]
fn soc_stays_within_battery_bounds_all_day() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(1440);

    for state in engine.history_snapshot() {
        for home in &state.homes {
            assert!(
                home.soc_kwh >= -1e-6,
                "{} SOC below zero at minute {}: {}",
                home.id,
                state.minute_of_day,
                home.soc_kwh
            );
            assert!(
                home.soc_kwh <= home.battery_capacity_kwh + 1e-6,
                "{} SOC above capacity at minute {}: {}",
                home.id,
                state.minute_of_day,
                home.soc_kwh
            );
        }
    }
}

#[test]
fn all_flows_are_non_negative_all_day() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(1440);

    for state in engine.history_snapshot() {
        for home in &state.homes {
            for (name, kw) in [
                ("pv", home.pv_kw),
                ("load", home.load_kw),
                ("charge", home.charge_kw),
                ("discharge", home.discharge_kw),
                ("share", home.share_kw),
                ("recv", home.recv_kw),
                ("grid_in", home.grid_in_kw),
                ("grid_out", home.grid_out_kw),
            ] {
                assert!(
                    kw >= 0.0,
                    "{} {name} negative at minute {}: {kw}",
                    home.id,
                    state.minute_of_day
                );
            }
        }
    }
}

#[test]
fn credits_sum_to_zero_every_tick() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(1440);

    for state in engine.history_snapshot() {
        let total: f64 = state.homes.iter().map(|h| h.credits_delta_kwh).sum();
        assert!(
            total.abs() < 0.01,
            "credits off by {total} kWh at minute {}",
            state.minute_of_day
        );
    }
}

#[test]
fn energy_balances_every_tick() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(1440);

    for state in engine.history_snapshot() {
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
        assert!(
            (sources - sinks).abs() < 0.01,
            "balance off by {} kWh at minute {}",
            sources - sinks,
            state.minute_of_day
        );
    }
}

#[test]
fn a_full_day_produces_no_validation_warnings() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(1440);

    for state in engine.history_snapshot() {
        let violations = validate_tick(&state);
        assert!(
            violations.is_empty(),
            "minute {}: {violations:?}",
            state.minute_of_day
        );
    }
}

#[test]
fn identical_seeds_produce_identical_tick_sequences() {
    let mut engine_a = MicrogridEngine::new(42);
    let mut engine_b = MicrogridEngine::new(42);

    let deltas_a = engine_a.run_for(300);
    let deltas_b = engine_b.run_for(300);

    assert_eq!(deltas_a, deltas_b);
    assert_eq!(engine_a.history_snapshot(), engine_b.history_snapshot());
}

#[test]
fn different_seeds_diverge() {
    let mut engine_a = MicrogridEngine::new(42);
    let mut engine_b = MicrogridEngine::new(43);

    engine_a.run_for(300);
    engine_b.run_for(300);

    assert_ne!(engine_a.history_snapshot(), engine_b.history_snapshot());
}

#[test]
fn reset_replays_the_same_sequence_as_a_fresh_engine() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(200);
    engine.reset(42, SimMode::Accelerated);
    let replay = engine.run_for(200);

    let mut fresh = MicrogridEngine::new(42);
    let original = fresh.run_for(200);

    assert_eq!(replay, original);
    assert_eq!(engine.history_snapshot(), fresh.history_snapshot());
}

#[test]
fn history_ring_evicts_oldest_beyond_three_days() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(HISTORY_LIMIT + 5);

    assert_eq!(engine.history_len(), HISTORY_LIMIT);
    let history = engine.history_snapshot();
    // Ticks 1..=4325 ran; the first five snapshots were evicted.
    assert_eq!(history[0].timestamp, common::at_minute(6));
    let last = history.last();
    assert_eq!(
        last.map(|s| s.timestamp),
        Some(common::at_minute((HISTORY_LIMIT + 5) as u32))
    );
}

#[test]
fn rollup_is_replaced_when_the_date_changes() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(1439);

    let first_day = engine.daily_rollup();
    assert_eq!(
        first_day.as_ref().map(|r| r.date),
        Some(default_start().date())
    );
    let production_day_one = first_day.map_or(0.0, |r| r.production_kwh);
    assert!(production_day_one > 0.0, "a sunny day produced energy");

    // Tick 1440 lands on the next day's 00:00 and must start a fresh rollup.
    engine.step();
    let second_day = engine.daily_rollup();
    assert_eq!(second_day.as_ref().map(|r| r.date.day()), Some(5));
    let production_day_two = second_day.map_or(f64::MAX, |r| r.production_kwh);
    assert!(
        production_day_two < production_day_one,
        "new rollup starts from zero"
    );
}

#[test]
fn rollup_tracks_one_row_per_home() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(60);

    let rollup = engine.daily_rollup();
    assert_eq!(rollup.as_ref().map(|r| r.homes.len()), Some(20));
    let consumed: f64 = rollup.map_or(0.0, |r| r.homes.iter().map(|h| h.consumed_kwh).sum());
    assert!(consumed > 0.0, "homes consumed energy overnight");
}

#[test]
fn daily_rollup_matches_integrated_history() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(600);

    let expected: f64 = engine
        .history_snapshot()
        .iter()
        .map(|s| s.community.production_kw * DT_HOURS)
        .sum();
    let rollup_production = engine.daily_rollup().map_or(0.0, |r| r.production_kwh);
    assert!((rollup_production - expected).abs() < 1e-6);
}
