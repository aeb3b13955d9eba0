//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};

use pv_bess_sim::config::ScenarioConfig;
use pv_bess_sim::physics::battery::BatteryConfig;
use pv_bess_sim::sim::engine::Engine;
use pv_bess_sim::sim::types::{DispatchTrace, HourlyInput, HourlyResult};
use pv_bess_sim::synthetic::SyntheticYear;

/// Midnight on 2024-01-01 (a Monday).
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid start")
}

/// Small battery used by the literal scenarios (100 kWh, 50 kW, 95 %).
pub fn small_battery() -> BatteryConfig {
    BatteryConfig::builder()
        .usable_capacity_kwh(100.0)
        .power_rating_kw(50.0)
        .build()
        .expect("valid battery")
}

/// Seeded synthetic series of `hours` rows.
pub fn synthetic_inputs(hours: usize, seed: u64) -> Vec<HourlyInput> {
    SyntheticYear::builder()
        .hours(hours)
        .seed(seed)
        .build()
        .expect("valid synthetic year")
        .generate()
}

/// `n` hourly rows with the same PV and load every hour.
pub fn flat_inputs(n: usize, pv_kw: f64, load_kw: f64) -> Vec<HourlyInput> {
    (0..n)
        .map(|t| HourlyInput {
            timestamp: start() + Duration::hours(t as i64),
            simulation_profile_kw: pv_kw,
            load_kw,
            irradiation_wh_m2: 0.0,
            market_price: 50.0,
        })
        .collect()
}

/// Engine for a built-in preset.
pub fn preset_engine(name: &str) -> Engine {
    ScenarioConfig::from_preset(name)
        .expect("preset exists")
        .engine()
        .expect("preset builds")
}

/// Asserts every per-row physical invariant of a finished trace.
pub fn assert_trace_invariants(trace: &DispatchTrace, rating_kw: f64) {
    let capacity = trace.capacity_kwh();
    for r in trace.results() {
        assert_row_invariants(r, capacity, rating_kw);
    }
}

pub fn assert_row_invariants(r: &HourlyResult, capacity_kwh: f64, rating_kw: f64) {
    let b = &r.battery;
    let t = r.timestep;
    assert!(
        b.soc_kwh >= -1e-9 && b.soc_kwh <= capacity_kwh + 1e-9,
        "t={t}: soc {} outside [0, {capacity_kwh}]",
        b.soc_kwh
    );
    let balance = r.solar_gen_kw - r.direct_consumption_kw - b.pv_charged_kw - r.surplus_kw;
    assert!(balance.abs() < 1e-6, "t={t}: PV balance off by {balance}");
    assert!(r.surplus_kw >= -1e-9, "t={t}: negative surplus {}", r.surplus_kw);
    assert!(
        b.pv_charged_kw + b.grid_charged_kw <= rating_kw + 1e-6,
        "t={t}: charge {} exceeds rating",
        b.pv_charged_kw + b.grid_charged_kw
    );
    assert!(b.discharged_kw <= rating_kw + 1e-6, "t={t}: discharge exceeds rating");
    let unmet = (r.load_kw - (r.solar_gen_kw - b.pv_charged_kw)).max(0.0);
    assert!(
        b.discharged_kw <= unmet + 1e-6,
        "t={t}: discharge {} exceeds unmet load {unmet}",
        b.discharged_kw
    );
    assert_eq!(b.discharge_permitted, b.conditions.any_active(), "t={t}");
    if !b.discharge_permitted {
        assert_eq!(b.discharged_kw, 0.0, "t={t}: discharged without permission");
    }
}
