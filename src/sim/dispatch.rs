//! Single-hour dispatch state machine.

use crate::error::Result;
use crate::physics::battery::{BatteryConfig, BatteryState, check_step, update_soc};
use crate::physics::charge::{grid_charge_power, pv_to_bess};
use crate::physics::discharge::{discharge_power, evaluate_discharge_permission};

/// Exogenous signals and carried state for one dispatch call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestepInput {
    /// Scaled PV generation (kW).
    pub solar_kw: f64,
    pub load_kw: f64,
    /// SoC at the end of the previous step (kWh).
    pub prev_soc_kwh: f64,
    /// Hour of day, 0..=23.
    pub hour: u32,
    pub is_peak: bool,
    pub is_sunday: bool,
    pub step_hours: f64,
}

/// Dispatches the battery for one hour.
///
/// The order is fixed by data dependencies:
///
/// 1. PV charging (first claim on the inverter).
/// 2. Grid charging, sized from the post-PV SoC estimate and limited to the
///    inverter headroom PV left.
/// 3. Post-charge SoC estimate.
/// 4. Discharge permission from the grid load after solar.
/// 5. Discharge power against the post-charge estimate.
/// 6. Authoritative SoC from `prev_soc_kwh` and the three flows.
///
/// The estimates in steps 2 and 3 only size later flows; the returned SoC
/// comes from [`update_soc`].
///
/// # Errors
///
/// Propagates [`DispatchError::SocBounds`](crate::DispatchError::SocBounds)
/// from the SoC update, tagged with `timestep`, and
/// [`DispatchError::InputValidation`](crate::DispatchError::InputValidation)
/// for a negative carried SoC or a non-positive step. No partial state is
/// returned.
pub fn dispatch_timestep(
    input: &TimestepInput,
    config: &BatteryConfig,
    timestep: Option<usize>,
) -> Result<BatteryState> {
    let TimestepInput {
        solar_kw,
        load_kw,
        prev_soc_kwh,
        hour,
        is_peak,
        is_sunday,
        step_hours,
    } = *input;
    check_step(step_hours)?;

    let capacity = config.usable_capacity_kwh();
    let eta_c = config.charge_efficiency();

    // 1. PV charging
    let pv_charged_kw = pv_to_bess(solar_kw, load_kw, prev_soc_kwh, hour, config, is_peak, step_hours)?;

    // 2. Grid charging within the remaining inverter headroom
    let soc_after_pv = (prev_soc_kwh + pv_charged_kw * step_hours * eta_c).min(capacity);
    let remaining_kw = (config.power_rating_kw() - pv_charged_kw).max(0.0);
    let grid_charged_kw = grid_charge_power(soc_after_pv, config, step_hours, Some(remaining_kw))?;

    // 3. Post-charge estimate
    let soc_after_charge =
        (prev_soc_kwh + (pv_charged_kw + grid_charged_kw) * step_hours * eta_c).min(capacity);

    // 4. Permission
    let grid_load_after_solar_kw = (load_kw - (solar_kw - pv_charged_kw)).max(0.0);
    let conditions = evaluate_discharge_permission(
        hour,
        load_kw,
        solar_kw,
        grid_load_after_solar_kw,
        config,
        is_peak,
        is_sunday,
    );
    let discharge_permitted = conditions.any_active();

    // 5. Discharge
    let discharged_kw = discharge_power(
        load_kw,
        solar_kw,
        pv_charged_kw,
        soc_after_charge,
        config,
        discharge_permitted,
        step_hours,
    );

    // 6. Commit
    let soc_kwh = update_soc(
        prev_soc_kwh,
        pv_charged_kw,
        grid_charged_kw,
        discharged_kw,
        config,
        step_hours,
        timestep,
    )?;

    Ok(BatteryState {
        soc_kwh,
        pv_charged_kw,
        grid_charged_kw,
        discharged_kw,
        discharge_permitted,
        conditions,
    })
}
