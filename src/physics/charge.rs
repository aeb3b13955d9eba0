//! PV-to-battery and grid-to-battery charging power.

use crate::error::Result;
use crate::physics::battery::{BatteryConfig, charge_limit, check_step};
use crate::physics::types::{ChargingMode, GridChargeMode, hour_in_window};

/// PV power diverted into the battery this step.
///
/// PV charging is bounded by the headroom-derived [`charge_limit`] and the
/// inverter rating. Only PV left after serving `load * min_direct_pv_share`
/// is available.
///
/// * [`ChargingMode::TimeWindow`]: charges inside the configured window (which
///   may wrap midnight), never during a peak tariff hour.
/// * [`ChargingMode::PrechargeTarget`]: charges only before the target hour,
///   at the rate that reaches the target SoC by then.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`](crate::DispatchError::InputValidation)
/// for a negative SoC or a non-positive step.
pub fn pv_to_bess(
    solar_kw: f64,
    load_kw: f64,
    soc_kwh: f64,
    hour: u32,
    config: &BatteryConfig,
    is_peak: bool,
    step_hours: f64,
) -> Result<f64> {
    let headroom_kw = charge_limit(
        soc_kwh,
        config.usable_capacity_kwh(),
        config.charge_efficiency(),
        step_hours,
    )?;
    if solar_kw <= 0.0 {
        return Ok(0.0);
    }
    let max_charge_kw = headroom_kw.min(config.power_rating_kw());
    if max_charge_kw <= 0.0 {
        return Ok(0.0);
    }

    let available_kw = (solar_kw - load_kw * config.min_direct_pv_share()).max(0.0);
    if available_kw <= 0.0 {
        return Ok(0.0);
    }

    let kw = match config.charging_mode() {
        ChargingMode::TimeWindow => {
            let (start, end) = config.charge_window();
            if !hour_in_window(hour, start, end) || is_peak {
                return Ok(0.0);
            }
            (available_kw * config.active_pv2bess_share()).min(max_charge_kw)
        }
        ChargingMode::PrechargeTarget => {
            let target_hour = config.precharge_target_hour();
            if hour >= target_hour {
                return Ok(0.0);
            }
            let deficit_kwh = (config.precharge_target_soc_kwh() - soc_kwh).max(0.0);
            if deficit_kwh <= 0.0 {
                return Ok(0.0);
            }
            let hours_remaining = f64::from((target_hour - hour).max(1));
            let required_kw = deficit_kwh / (config.charge_efficiency() * hours_remaining);
            required_kw.min(available_kw).min(max_charge_kw)
        }
    };
    Ok(kw)
}

/// Grid power drawn into the battery this step.
///
/// The SoC target is the usable capacity in [`GridChargeMode::ToFull`] and the
/// grid-charge capacity (clamped to usable capacity) in
/// [`GridChargeMode::ToTarget`]. The rate is further capped by the grid-charge
/// capacity, the inverter rating and `max_power_override`, which the
/// dispatcher sets to the inverter headroom left after PV charging.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`](crate::DispatchError::InputValidation)
/// for a non-positive step.
pub fn grid_charge_power(
    soc_kwh: f64,
    config: &BatteryConfig,
    step_hours: f64,
    max_power_override: Option<f64>,
) -> Result<f64> {
    check_step(step_hours)?;
    let target_kwh = match config.grid_charge_mode() {
        GridChargeMode::Disabled => return Ok(0.0),
        GridChargeMode::ToTarget => config
            .grid_charge_capacity_kw()
            .min(config.usable_capacity_kwh()),
        GridChargeMode::ToFull => config.usable_capacity_kwh(),
    };

    let rate_kw = (target_kwh - soc_kwh).max(0.0) / (config.charge_efficiency() * step_hours);
    let limit_kw = match max_power_override {
        Some(cap) => config.power_rating_kw().min(cap.max(0.0)),
        None => config.power_rating_kw(),
    };
    Ok(rate_kw.min(config.grid_charge_capacity_kw()).min(limit_kw))
}
