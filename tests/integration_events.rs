//! Event scenarios: outages, cloudbursts, heatwaves, EV surges, and the
//! pool behavior they trigger.

mod common;

use microgrid_sim::config::{EventKind, EventParams, MicrogridConfig};
use microgrid_sim::sim::engine::MicrogridEngine;
use microgrid_sim::sim::simulator::MicrogridSimulator;

const NOON: u32 = 720;

#[test]
fn clear_noon_charges_the_battery_toward_target() {
    let mut sim = MicrogridSimulator::new(42);
    let config = MicrogridConfig::default();
    let mut homes = vec![common::single_home()];

    let soc_before = homes[0].soc_kwh;
    sim.tick(&mut homes, &config, common::at_minute(NOON), NOON);

    let home = &homes[0];
    assert!(
        home.pv_kw >= 8.0 * 0.95 && home.pv_kw <= 8.0 * 1.05,
        "noon PV outside the noise band: {}",
        home.pv_kw
    );
    assert!(
        home.load_kw >= 0.40 * 0.95 && home.load_kw <= 0.40 * 1.05,
        "noon load outside the noise band: {}",
        home.load_kw
    );
    assert!(home.charge_kw > 0.0, "surplus PV should charge the battery");
    assert!(home.soc_kwh > soc_before);
    assert!(
        home.soc_kwh <= home.battery_capacity_kwh * 0.9,
        "charging never overshoots the 90% daytime target"
    );
}

#[test]
fn outage_turns_unmet_need_into_unserved_load() {
    let mut sim = MicrogridSimulator::new(42);
    // Evening outage covering 20:00; the lone home has no PV and a battery
    // already drained to its reserve floor.
    let config = common::config_with_event(EventKind::Outage, 1140, 1440);
    let mut homes = vec![common::single_home()];
    homes[0].pv_size_kwp = 0.0;
    homes[0].soc_kwh = homes[0].battery_capacity_kwh * homes[0].reserve_floor_pct;

    let state = sim.tick(&mut homes, &config, common::at_minute(1200), 1200);

    let home = &homes[0];
    assert_eq!(home.grid_in_kw, 0.0);
    assert_eq!(home.grid_out_kw, 0.0);
    assert_eq!(home.discharge_kw, 0.0);
    assert!(
        (state.community.unserved_kw - home.load_kw).abs() < 1e-9,
        "the whole demand is destroyed: unserved={} load={}",
        state.community.unserved_kw,
        home.load_kw
    );
    assert_eq!(home.credits_delta_kwh, 0.0);
}

#[test]
fn cloudburst_attenuates_noon_pv() {
    let mut sim = MicrogridSimulator::new(42);
    let config = common::config_with_event(EventKind::Cloudburst, 700, 760);
    let mut homes = vec![common::single_home()];

    sim.tick(&mut homes, &config, common::at_minute(NOON), NOON);

    let pv = homes[0].pv_kw;
    assert!(
        pv >= 8.0 * 0.4 * 0.95 && pv <= 8.0 * 0.4 * 1.05,
        "cloudburst PV outside the attenuated band: {pv}"
    );
}

#[test]
fn cloudburst_honors_a_custom_pv_multiplier() {
    let mut sim = MicrogridSimulator::new(42);
    let mut config = common::config_with_event(EventKind::Cloudburst, 700, 760);
    config.events[0].params = EventParams {
        pv_multiplier: Some(0.2),
        ..EventParams::default()
    };
    let mut homes = vec![common::single_home()];

    sim.tick(&mut homes, &config, common::at_minute(NOON), NOON);

    let pv = homes[0].pv_kw;
    assert!(pv >= 8.0 * 0.2 * 0.95 && pv <= 8.0 * 0.2 * 1.05);
}

#[test]
fn heatwave_amplifies_load() {
    let mut sim = MicrogridSimulator::new(42);
    let config = common::config_with_event(EventKind::Heatwave, 700, 760);
    let mut homes = vec![common::single_home()];

    sim.tick(&mut homes, &config, common::at_minute(NOON), NOON);

    let load = homes[0].load_kw;
    assert!(
        load >= 0.40 * 1.15 * 0.95 && load <= 0.40 * 1.15 * 1.05,
        "heatwave load outside the amplified band: {load}"
    );
}

#[test]
fn ev_surge_only_bites_in_the_evening_window() {
    let config = common::config_with_event(EventKind::EvSurge, 0, 1440);

    // 16:40 — the event is active but the charging window has not opened.
    let mut sim = MicrogridSimulator::new(42);
    let mut homes = vec![common::single_home()];
    sim.tick(&mut homes, &config, common::at_minute(1000), 1000);
    assert!(homes[0].load_kw < 3.0);

    // 20:00 — event active and inside the 19:00-23:59 window.
    let mut sim = MicrogridSimulator::new(42);
    let mut homes = vec![common::single_home()];
    sim.tick(&mut homes, &config, common::at_minute(1200), 1200);
    assert!(
        homes[0].load_kw >= 3.0,
        "surge adds 3 kW on top of the curve: {}",
        homes[0].load_kw
    );
}

#[test]
fn engine_outage_zeroes_community_grid_exchange() {
    let mut engine = MicrogridEngine::new(42);
    // Run to 09:00, then cut the grid for four hours.
    engine.run_for(540);
    let added = engine.add_event(EventKind::Outage, 240, None);
    assert!(added.is_ok());

    engine.run_for(120);

    let history = engine.history_snapshot();
    for state in &history[540..] {
        assert_eq!(
            state.community.grid_import_kw, 0.0,
            "no import during outage at minute {}",
            state.minute_of_day
        );
        assert_eq!(
            state.community.grid_export_kw, 0.0,
            "no export during outage at minute {}",
            state.minute_of_day
        );
    }
}

#[test]
fn pool_shares_equal_pool_receipts_every_tick() {
    let mut engine = MicrogridEngine::new(42);
    engine.run_for(1440);

    for state in engine.history_snapshot() {
        let shared: f64 = state.homes.iter().map(|h| h.share_kw).sum();
        let received: f64 = state.homes.iter().map(|h| h.recv_kw).sum();
        assert!(
            (shared - received).abs() < 1e-6,
            "pool out of balance at minute {}: {shared} vs {received}",
            state.minute_of_day
        );
    }
}

#[test]
fn midday_surplus_reaches_pool_consumers() {
    // One oversized array next to a PV-less neighbor guarantees pool flow.
    let scenario = common::scenario_with_homes(vec![
        common::single_home_spec(),
        microgrid_sim::config::HomeSpec {
            id: "H2".to_string(),
            pv_kwp: 0.0,
            battery_kwh: 6.0,
            scale: 1.5,
            critical: true,
        },
    ]);
    let mut engine = MicrogridEngine::from_scenario(&scenario);
    engine.run_for(780); // through 13:00

    let noonish: Vec<_> = engine
        .history_snapshot()
        .into_iter()
        .filter(|s| s.minute_of_day >= 660 && s.minute_of_day <= 780)
        .collect();
    assert!(!noonish.is_empty());
    assert!(
        noonish.iter().any(|s| s.community.microgrid_used_kw > 0.0),
        "the pool moved energy around midday"
    );
}
