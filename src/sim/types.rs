//! Core simulation types: run settings, hourly inputs and the dispatch trace.

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::error::{DispatchError, Result};
use crate::physics::battery::BatteryState;
use crate::physics::types::DEFAULT_STEP_HOURS;

/// Run-level settings shared by every timestep.
///
/// # Examples
///
/// ```
/// use pv_bess_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(1.0, 0.0, 1.1, true).expect("valid settings");
/// assert_eq!(cfg.step_hours, 1.0);
/// assert!(SimConfig::new(0.0, 0.0, 1.0, true).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    /// Duration of one timestep in hours.
    pub step_hours: f64,
    /// SoC before the first timestep (kWh).
    pub initial_soc_kwh: f64,
    /// `actual_capacity / simulation_capacity` applied to the PV profile.
    pub scale_factor: f64,
    /// When false the battery stays idle and all PV goes to load or surplus.
    pub bess_enabled: bool,
}

impl SimConfig {
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] for a non-positive step or
    /// scale factor, or a negative initial SoC.
    pub fn new(
        step_hours: f64,
        initial_soc_kwh: f64,
        scale_factor: f64,
        bess_enabled: bool,
    ) -> Result<Self> {
        if !(step_hours > 0.0 && step_hours.is_finite()) {
            return Err(DispatchError::invalid_config(
                "step_hours",
                format!("must be > 0, got {step_hours}"),
            ));
        }
        if !(scale_factor > 0.0 && scale_factor.is_finite()) {
            return Err(DispatchError::invalid_config(
                "scale_factor",
                format!("must be > 0, got {scale_factor}"),
            ));
        }
        if initial_soc_kwh < 0.0 || initial_soc_kwh.is_nan() {
            return Err(DispatchError::invalid_config(
                "initial_soc_kwh",
                format!("must be >= 0, got {initial_soc_kwh}"),
            ));
        }
        Ok(Self {
            step_hours,
            initial_soc_kwh,
            scale_factor,
            bess_enabled,
        })
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_hours: DEFAULT_STEP_HOURS,
            initial_soc_kwh: 0.0,
            scale_factor: 1.0,
            bess_enabled: true,
        }
    }
}

/// One row of exogenous hourly data.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyInput {
    pub timestamp: NaiveDateTime,
    /// Raw PV output at the simulation capacity (kW, >= 0).
    pub simulation_profile_kw: f64,
    /// Site load (kW, >= 0).
    pub load_kw: f64,
    /// Plane-of-array irradiation (Wh/m², >= 0).
    pub irradiation_wh_m2: f64,
    /// Market price for the hour; only carried through to downstream layers.
    pub market_price: f64,
}

impl HourlyInput {
    /// Hour of day, 0..=23.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn is_sunday(&self) -> bool {
        self.timestamp.weekday() == Weekday::Sun
    }
}

/// Complete record of one dispatched hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyResult {
    pub timestep: usize,
    pub timestamp: NaiveDateTime,
    pub hour: u32,
    /// Scaled PV generation (kW).
    pub solar_gen_kw: f64,
    pub load_kw: f64,
    /// PV serving load directly (kW).
    pub direct_consumption_kw: f64,
    /// PV neither consumed nor stored (kW).
    pub surplus_kw: f64,
    /// Load left after direct PV (kW).
    pub grid_load_after_solar_kw: f64,
    /// Grid import after PV and battery, including grid charging (kW).
    pub grid_load_after_re_kw: f64,
    pub battery: BatteryState,
}

impl fmt::Display for HourlyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>4} ({}) | solar={:>7.2} kW  load={:>7.2} kW  direct={:>7.2} kW  \
             surplus={:>7.2} kW | pv->bess={:.2}  grid->bess={:.2}  bess->load={:.2} \
             (SoC={:.2} kWh) | grid={:.2} kW [{}]",
            self.timestep,
            self.timestamp,
            self.solar_gen_kw,
            self.load_kw,
            self.direct_consumption_kw,
            self.surplus_kw,
            self.battery.pv_charged_kw,
            self.battery.grid_charged_kw,
            self.battery.discharged_kw,
            self.battery.soc_kwh,
            self.grid_load_after_re_kw,
            self.battery.conditions,
        )
    }
}

/// The finished, read-only per-hour record of one run.
///
/// Consumers get slices and column copies; the rows themselves are never
/// handed out mutably.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTrace {
    results: Vec<HourlyResult>,
    step_hours: f64,
    capacity_kwh: f64,
}

impl DispatchTrace {
    pub(crate) fn new(results: Vec<HourlyResult>, step_hours: f64, capacity_kwh: f64) -> Self {
        Self {
            results,
            step_hours,
            capacity_kwh,
        }
    }

    pub fn results(&self) -> &[HourlyResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn step_hours(&self) -> f64 {
        self.step_hours
    }

    /// Usable battery capacity the trace was dispatched against (kWh).
    pub fn capacity_kwh(&self) -> f64 {
        self.capacity_kwh
    }

    pub fn battery_states(&self) -> impl Iterator<Item = &BatteryState> + '_ {
        self.results.iter().map(|r| &r.battery)
    }

    /// End-of-step SoC for every hour (kWh).
    pub fn soc_kwh(&self) -> Vec<f64> {
        self.column(|r| r.battery.soc_kwh)
    }

    pub fn solar_gen_kw(&self) -> Vec<f64> {
        self.column(|r| r.solar_gen_kw)
    }

    pub fn direct_consumption_kw(&self) -> Vec<f64> {
        self.column(|r| r.direct_consumption_kw)
    }

    pub fn surplus_kw(&self) -> Vec<f64> {
        self.column(|r| r.surplus_kw)
    }

    pub fn pv_charged_kw(&self) -> Vec<f64> {
        self.column(|r| r.battery.pv_charged_kw)
    }

    pub fn discharged_kw(&self) -> Vec<f64> {
        self.column(|r| r.battery.discharged_kw)
    }

    fn column(&self, f: impl Fn(&HourlyResult) -> f64) -> Vec<f64> {
        self.results.iter().map(f).collect()
    }

    /// Consumes the trace, returning the rows.
    pub fn into_results(self) -> Vec<HourlyResult> {
        self.results
    }
}
