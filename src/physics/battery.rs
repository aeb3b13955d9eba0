use tracing::trace;

use crate::error::{DispatchError, Result};
use crate::physics::discharge::{DischargeCondition, DischargeConditions};
use crate::physics::types::{ChargingMode, GridChargeMode, SOC_TOLERANCE_KWH, StrategyMode};

/// Immutable battery system configuration.
///
/// Built once per simulation run through [`BatteryConfig::builder`], which
/// validates every parameter before the value exists. There are no setters:
/// changing a parameter means building a new config.
///
/// # Examples
///
/// ```
/// use pv_bess_sim::physics::battery::BatteryConfig;
///
/// let config = BatteryConfig::builder()
///     .usable_capacity_kwh(100.0)
///     .power_rating_kw(50.0)
///     .build()
///     .expect("valid config");
/// assert_eq!(config.usable_capacity_kwh(), 100.0);
///
/// let bad = BatteryConfig::builder()
///     .usable_capacity_kwh(100.0)
///     .power_rating_kw(50.0)
///     .charge_efficiency(1.2)
///     .build();
/// assert!(bad.is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryConfig {
    usable_capacity_kwh: f64,
    power_rating_kw: f64,
    charge_efficiency: f64,
    discharge_efficiency: f64,
    strategy_mode: StrategyMode,
    charging_mode: ChargingMode,
    charge_start_hour: u32,
    charge_end_hour: u32,
    precharge_target_hour: u32,
    precharge_target_soc_kwh: f64,
    min_direct_pv_share: f64,
    active_pv2bess_share: f64,
    demand_target_kw: f64,
    grid_charge_mode: GridChargeMode,
    grid_charge_capacity_kw: f64,
    when_needed: bool,
    after_sunset: bool,
    optimize_mode: bool,
    peak_mode: bool,
    optimize_start_hour: u32,
    optimize_end_hour: u32,
    sunday_peak_start_hour: u32,
    sunday_peak_end_hour: u32,
}

#[bon::bon]
impl BatteryConfig {
    /// Validates all parameters and builds the config.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] naming the first offending
    /// field: non-positive capacity or rating, an efficiency outside (0, 1],
    /// a share outside [0, 1], an hour above 23, or a negative target.
    #[builder]
    pub fn new(
        usable_capacity_kwh: f64,
        power_rating_kw: f64,
        #[builder(default = 0.95)] charge_efficiency: f64,
        #[builder(default = 0.95)] discharge_efficiency: f64,
        #[builder(default)] strategy_mode: StrategyMode,
        #[builder(default)] charging_mode: ChargingMode,
        #[builder(default = 9)] charge_start_hour: u32,
        #[builder(default = 15)] charge_end_hour: u32,
        #[builder(default = 17)] precharge_target_hour: u32,
        #[builder(default)] precharge_target_soc_kwh: f64,
        #[builder(default)] min_direct_pv_share: f64,
        #[builder(default = 1.0)] active_pv2bess_share: f64,
        #[builder(default)] demand_target_kw: f64,
        #[builder(default)] grid_charge_mode: GridChargeMode,
        #[builder(default)] grid_charge_capacity_kw: f64,
        #[builder(default = true)] when_needed: bool,
        #[builder(default)] after_sunset: bool,
        #[builder(default)] optimize_mode: bool,
        #[builder(default = true)] peak_mode: bool,
        #[builder(default = 16)] optimize_start_hour: u32,
        #[builder(default = 21)] optimize_end_hour: u32,
        #[builder(default = 17)] sunday_peak_start_hour: u32,
        #[builder(default = 20)] sunday_peak_end_hour: u32,
    ) -> Result<Self> {
        positive("usable_capacity_kwh", usable_capacity_kwh)?;
        positive("power_rating_kw", power_rating_kw)?;
        efficiency("charge_efficiency", charge_efficiency)?;
        efficiency("discharge_efficiency", discharge_efficiency)?;
        ratio("min_direct_pv_share", min_direct_pv_share)?;
        ratio("active_pv2bess_share", active_pv2bess_share)?;
        non_negative("demand_target_kw", demand_target_kw)?;
        non_negative("grid_charge_capacity_kw", grid_charge_capacity_kw)?;
        non_negative("precharge_target_soc_kwh", precharge_target_soc_kwh)?;
        if precharge_target_soc_kwh > usable_capacity_kwh {
            return Err(DispatchError::invalid_config(
                "precharge_target_soc_kwh",
                format!("must be <= usable_capacity_kwh ({usable_capacity_kwh}), got {precharge_target_soc_kwh}"),
            ));
        }
        for (field, hour) in [
            ("charge_start_hour", charge_start_hour),
            ("charge_end_hour", charge_end_hour),
            ("precharge_target_hour", precharge_target_hour),
            ("optimize_start_hour", optimize_start_hour),
            ("optimize_end_hour", optimize_end_hour),
            ("sunday_peak_start_hour", sunday_peak_start_hour),
            ("sunday_peak_end_hour", sunday_peak_end_hour),
        ] {
            if hour > 23 {
                return Err(DispatchError::invalid_config(
                    field,
                    format!("must be in 0..=23, got {hour}"),
                ));
            }
        }

        Ok(Self {
            usable_capacity_kwh,
            power_rating_kw,
            charge_efficiency,
            discharge_efficiency,
            strategy_mode,
            charging_mode,
            charge_start_hour,
            charge_end_hour,
            precharge_target_hour,
            precharge_target_soc_kwh,
            min_direct_pv_share,
            active_pv2bess_share,
            demand_target_kw,
            grid_charge_mode,
            grid_charge_capacity_kw,
            when_needed,
            after_sunset,
            optimize_mode,
            peak_mode,
            optimize_start_hour,
            optimize_end_hour,
            sunday_peak_start_hour,
            sunday_peak_end_hour,
        })
    }
}

impl BatteryConfig {
    pub const fn usable_capacity_kwh(&self) -> f64 {
        self.usable_capacity_kwh
    }

    pub const fn power_rating_kw(&self) -> f64 {
        self.power_rating_kw
    }

    pub const fn charge_efficiency(&self) -> f64 {
        self.charge_efficiency
    }

    pub const fn discharge_efficiency(&self) -> f64 {
        self.discharge_efficiency
    }

    pub const fn strategy_mode(&self) -> StrategyMode {
        self.strategy_mode
    }

    pub const fn charging_mode(&self) -> ChargingMode {
        self.charging_mode
    }

    /// Inclusive charge window `(start, end)`; may wrap midnight.
    pub const fn charge_window(&self) -> (u32, u32) {
        (self.charge_start_hour, self.charge_end_hour)
    }

    pub const fn precharge_target_hour(&self) -> u32 {
        self.precharge_target_hour
    }

    pub const fn precharge_target_soc_kwh(&self) -> f64 {
        self.precharge_target_soc_kwh
    }

    /// Minimum share of load that PV must serve directly before charging.
    pub const fn min_direct_pv_share(&self) -> f64 {
        self.min_direct_pv_share
    }

    /// Maximum share of available PV diverted into the battery.
    pub const fn active_pv2bess_share(&self) -> f64 {
        self.active_pv2bess_share
    }

    pub const fn demand_target_kw(&self) -> f64 {
        self.demand_target_kw
    }

    pub const fn grid_charge_mode(&self) -> GridChargeMode {
        self.grid_charge_mode
    }

    /// Grid-charge power cap; in [`GridChargeMode::ToTarget`] also the SoC target (kWh).
    pub const fn grid_charge_capacity_kw(&self) -> f64 {
        self.grid_charge_capacity_kw
    }

    /// Whether the given arbitrage condition is enabled.
    pub const fn condition_enabled(&self, condition: DischargeCondition) -> bool {
        match condition {
            DischargeCondition::WhenNeeded => self.when_needed,
            DischargeCondition::AfterSunset => self.after_sunset,
            DischargeCondition::Optimize => self.optimize_mode,
            DischargeCondition::Peak => self.peak_mode,
        }
    }

    pub const fn optimize_window(&self) -> (u32, u32) {
        (self.optimize_start_hour, self.optimize_end_hour)
    }

    pub const fn sunday_peak_window(&self) -> (u32, u32) {
        (self.sunday_peak_start_hour, self.sunday_peak_end_hour)
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(DispatchError::invalid_config(field, format!("must be > 0, got {value}")))
    }
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(DispatchError::invalid_config(field, format!("must be >= 0, got {value}")))
    }
}

fn efficiency(field: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(DispatchError::invalid_config(field, format!("must be in (0, 1], got {value}")))
    }
}

fn ratio(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DispatchError::invalid_config(field, format!("must be in [0, 1], got {value}")))
    }
}

/// Snapshot of one dispatched timestep.
///
/// Power flows are in kW over the step; `soc_kwh` is the state of charge at
/// the end of the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryState {
    pub soc_kwh: f64,
    pub pv_charged_kw: f64,
    pub grid_charged_kw: f64,
    pub discharged_kw: f64,
    pub discharge_permitted: bool,
    /// Discharge conditions evaluated for this step.
    pub conditions: DischargeConditions,
}

impl BatteryState {
    /// A step in which the battery neither charges nor discharges.
    pub const fn idle(soc_kwh: f64) -> Self {
        Self {
            soc_kwh,
            pv_charged_kw: 0.0,
            grid_charged_kw: 0.0,
            discharged_kw: 0.0,
            discharge_permitted: false,
            conditions: DischargeConditions::NONE,
        }
    }

    /// Names of the conditions that permitted discharge, in canonical order.
    pub fn active_discharge_conditions(&self) -> Vec<&'static str> {
        self.conditions.active().map(DischargeCondition::name).collect()
    }

    /// Total charging power from PV and grid.
    pub fn charged_kw(&self) -> f64 {
        self.pv_charged_kw + self.grid_charged_kw
    }
}

/// Maximum charging power that exactly fills the remaining headroom in one step.
///
/// `max(capacity - soc, 0) / charge_efficiency / step_hours`.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] for a negative SoC, a
/// non-positive capacity or step, or an efficiency outside (0, 1].
pub fn charge_limit(
    soc_kwh: f64,
    capacity_kwh: f64,
    charge_efficiency: f64,
    step_hours: f64,
) -> Result<f64> {
    if soc_kwh < 0.0 || soc_kwh.is_nan() {
        return Err(DispatchError::input("soc_kwh", format!("cannot be negative: {soc_kwh}")));
    }
    if capacity_kwh <= 0.0 || capacity_kwh.is_nan() {
        return Err(DispatchError::input(
            "capacity_kwh",
            format!("must be positive: {capacity_kwh}"),
        ));
    }
    if !(charge_efficiency > 0.0 && charge_efficiency <= 1.0) {
        return Err(DispatchError::input(
            "charge_efficiency",
            format!("must be in (0, 1]: {charge_efficiency}"),
        ));
    }
    check_step(step_hours)?;

    let headroom_kwh = (capacity_kwh - soc_kwh).max(0.0);
    Ok(headroom_kwh / charge_efficiency / step_hours)
}

pub(crate) fn check_step(step_hours: f64) -> Result<()> {
    if step_hours > 0.0 && step_hours.is_finite() {
        Ok(())
    } else {
        Err(DispatchError::input("step_hours", format!("must be positive: {step_hours}")))
    }
}

/// Advances SoC by one step.
///
/// Charging input is multiplied by the charge efficiency (energy stored);
/// discharge output is divided by the discharge efficiency (energy extracted).
/// An excursion within [`SOC_TOLERANCE_KWH`] of the bounds is clipped; anything
/// beyond is a dispatch defect.
///
/// # Errors
///
/// Returns [`DispatchError::SocBounds`] carrying the unclipped value, the
/// capacity, and `timestep` when the result leaves `[0, capacity]` by more
/// than the tolerance.
pub fn update_soc(
    prev_soc_kwh: f64,
    pv_charged_kw: f64,
    grid_charged_kw: f64,
    discharged_kw: f64,
    config: &BatteryConfig,
    step_hours: f64,
    timestep: Option<usize>,
) -> Result<f64> {
    check_step(step_hours)?;
    let capacity = config.usable_capacity_kwh;

    let stored_kwh = (pv_charged_kw + grid_charged_kw) * step_hours * config.charge_efficiency;
    let extracted_kwh = discharged_kw * step_hours / config.discharge_efficiency;
    let unclipped = prev_soc_kwh + stored_kwh - extracted_kwh;

    if unclipped < -SOC_TOLERANCE_KWH
        || unclipped > capacity + SOC_TOLERANCE_KWH
        || unclipped.is_nan()
    {
        return Err(DispatchError::SocBounds {
            timestep,
            soc_kwh: unclipped,
            capacity_kwh: capacity,
            violations: 1,
        });
    }

    let soc = unclipped.clamp(0.0, capacity);
    if soc != unclipped {
        trace!(?timestep, unclipped, soc, "clipped SoC within tolerance");
    }
    Ok(soc)
}
