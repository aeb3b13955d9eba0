//! Reference behaviour of the dispatch primitives through the public API.

mod common;

use approx::assert_abs_diff_eq;
use rstest::rstest;

use pv_bess_sim::DispatchError;
use pv_bess_sim::physics::balance::{validate_power_rating, validate_soc_bounds};
use pv_bess_sim::physics::battery::{BatteryConfig, charge_limit, update_soc};
use pv_bess_sim::physics::discharge::{
    DischargeCondition, discharge_power, evaluate_discharge_permission,
};
use pv_bess_sim::physics::solar::{direct_pv_consumption, surplus_generation};
use pv_bess_sim::physics::types::{RATING_TOLERANCE, SOC_TOLERANCE_KWH};

#[rstest]
#[case(0.0, 111.111_111)]
#[case(50.0, 55.555_556)]
#[case(100.0, 0.0)]
fn charge_limit_reference_points(#[case] soc: f64, #[case] expected: f64) {
    let limit = charge_limit(soc, 100.0, 0.9, 1.0).expect("valid inputs");
    assert_abs_diff_eq!(limit, expected, epsilon = 1e-5);
}

#[test]
fn update_soc_charge_and_discharge_reference_points() {
    let cfg = common::small_battery();
    let charged = update_soc(50.0, 10.0, 0.0, 0.0, &cfg, 1.0, None).expect("charge");
    assert_abs_diff_eq!(charged, 59.5, epsilon = 1e-9);

    let discharged = update_soc(50.0, 0.0, 0.0, 10.0, &cfg, 1.0, None).expect("discharge");
    assert_abs_diff_eq!(discharged, 50.0 - 10.0 / 0.95, epsilon = 1e-9);
    assert_abs_diff_eq!(discharged, 39.47, epsilon = 0.01);
}

#[test]
fn round_trip_loses_energy() {
    let cfg = common::small_battery();
    let up = update_soc(50.0, 10.0, 0.0, 0.0, &cfg, 1.0, None).expect("charge");
    let down = update_soc(up, 0.0, 0.0, 10.0 * 0.95, &cfg, 1.0, None).expect("discharge");
    assert!(down < 50.0);
    // 9.5 kWh stored, 10 kWh drawn to deliver 9.5 kW
    assert_abs_diff_eq!(down, 49.5, epsilon = 1e-9);
}

#[test]
fn discharge_covers_unmet_load() {
    let cfg = common::small_battery();
    let power = discharge_power(30.0, 10.0, 0.0, 100.0, &cfg, true, 1.0);
    assert_abs_diff_eq!(power, 20.0, epsilon = 1e-12);
    assert_eq!(discharge_power(30.0, 10.0, 0.0, 100.0, &cfg, false, 1.0), 0.0);
}

#[test]
fn direct_consumption_limited_by_available_pv() {
    let direct = direct_pv_consumption(100.0, 80.0, 30.0).expect("valid");
    assert_abs_diff_eq!(direct, 70.0, epsilon = 1e-12);
}

#[test]
fn over_allocated_pv_is_an_energy_balance_error() {
    let err = surplus_generation(100.0, 60.0, 50.0).unwrap_err();
    assert!(matches!(err, DispatchError::EnergyBalance { .. }), "got {err:?}");
}

#[test]
fn soc_overflow_is_reported_not_clamped() {
    let cfg = BatteryConfig::builder()
        .usable_capacity_kwh(100.0)
        .power_rating_kw(50.0)
        .charge_efficiency(1.0)
        .build()
        .expect("valid");
    let err = update_soc(100.0, 42.5, 0.0, 0.0, &cfg, 1.0, Some(4)).unwrap_err();
    match err {
        DispatchError::SocBounds {
            timestep,
            soc_kwh,
            capacity_kwh,
            ..
        } => {
            assert_eq!(timestep, Some(4));
            assert_abs_diff_eq!(soc_kwh, 142.5, epsilon = 1e-9);
            assert_eq!(capacity_kwh, 100.0);
        }
        other => panic!("expected SocBounds, got {other:?}"),
    }

    assert!(validate_soc_bounds(142.5, 100.0, SOC_TOLERANCE_KWH, Some(4)).is_err());
    assert!(validate_soc_bounds(100.005, 100.0, SOC_TOLERANCE_KWH, None).is_ok());
}

#[test]
fn rating_violation_reports_requested_and_available() {
    let err = validate_power_rating(60.0, 50.0, "bess discharge", RATING_TOLERANCE, Some(2)).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("bess discharge"), "{msg}");
    assert!(msg.contains("60.00") && msg.contains("50.00"), "{msg}");
}

#[test]
fn overlapping_conditions_are_recorded_not_rejected() {
    let cfg = BatteryConfig::builder()
        .usable_capacity_kwh(100.0)
        .power_rating_kw(50.0)
        .after_sunset(true)
        .optimize_mode(true)
        .build()
        .expect("valid");
    let conditions = evaluate_discharge_permission(18, 80.0, 0.0, 80.0, &cfg, true, false);
    assert!(conditions.overlapping());
    assert_eq!(conditions.count_active(), 4);
    for c in DischargeCondition::ALL {
        assert!(conditions.contains(c), "{c} should be active");
    }
}

#[test]
fn invalid_battery_config_never_builds() {
    for (cap, rating, eff) in [(0.0, 50.0, 0.9), (100.0, -1.0, 0.9), (100.0, 50.0, 0.0), (100.0, 50.0, 1.01)] {
        let result = BatteryConfig::builder()
            .usable_capacity_kwh(cap)
            .power_rating_kw(rating)
            .charge_efficiency(eff)
            .build();
        assert!(
            matches!(result, Err(DispatchError::InvalidConfig { .. })),
            "cap={cap} rating={rating} eff={eff}"
        );
    }
}
