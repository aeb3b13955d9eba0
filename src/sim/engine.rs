//! Simulation engine that runs the hourly dispatch loop over a full series.

use tracing::info;

use crate::error::{DispatchError, Result};
use crate::physics::balance::{
    validate_energy_balance_series, validate_power_rating_series, validate_soc_bounds_series,
};
use crate::physics::battery::{BatteryConfig, BatteryState};
use crate::physics::solar::{direct_pv_consumption, scale_generation, surplus_generation};
use crate::physics::types::{BALANCE_TOLERANCE_KWH, RATING_TOLERANCE, SOC_TOLERANCE_KWH};

use super::dispatch::{TimestepInput, dispatch_timestep};
use super::tariff::TariffSchedule;
use super::types::{DispatchTrace, HourlyInput, HourlyResult, SimConfig};

/// Simulation engine owning the run settings, battery and tariff.
///
/// The engine holds no per-run state: [`Engine::run`] threads SoC through a
/// local loop, so one engine can run several independent series, including
/// from different threads.
#[derive(Debug, Clone)]
pub struct Engine {
    config: SimConfig,
    battery: BatteryConfig,
    tariff: TariffSchedule,
}

impl Engine {
    /// Creates a new simulation engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Run-level settings (step, initial SoC, PV scale factor)
    /// * `battery` - Validated battery configuration
    /// * `tariff` - Hour-of-day tariff periods
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] if the initial SoC exceeds the
    /// usable capacity.
    pub fn new(config: SimConfig, battery: BatteryConfig, tariff: TariffSchedule) -> Result<Self> {
        if config.initial_soc_kwh > battery.usable_capacity_kwh() {
            return Err(DispatchError::invalid_config(
                "initial_soc_kwh",
                format!(
                    "must be <= usable_capacity_kwh ({}), got {}",
                    battery.usable_capacity_kwh(),
                    config.initial_soc_kwh
                ),
            ));
        }
        Ok(Self {
            config,
            battery,
            tariff,
        })
    }

    /// Dispatches one hour given the previous SoC.
    ///
    /// # Arguments
    ///
    /// * `t` - Timestep index, attached to any error
    /// * `input` - Exogenous data for the hour
    /// * `solar_gen_kw` - Scaled PV generation for the hour
    /// * `prev_soc_kwh` - SoC at the end of the previous hour
    ///
    /// # Errors
    ///
    /// Any dispatch, SoC or generation-balance failure for this hour.
    pub fn step(
        &self,
        t: usize,
        input: &HourlyInput,
        solar_gen_kw: f64,
        prev_soc_kwh: f64,
    ) -> Result<HourlyResult> {
        let hour = input.hour();
        let load_kw = input.load_kw;

        // 1. Battery dispatch
        let battery = if self.config.bess_enabled {
            let step_input = TimestepInput {
                solar_kw: solar_gen_kw,
                load_kw,
                prev_soc_kwh,
                hour,
                is_peak: self.tariff.is_peak(hour),
                is_sunday: input.is_sunday(),
                step_hours: self.config.step_hours,
            };
            dispatch_timestep(&step_input, &self.battery, Some(t))?
        } else {
            BatteryState::idle(prev_soc_kwh)
        };

        // 2. Generation side
        let direct_consumption_kw =
            direct_pv_consumption(solar_gen_kw, load_kw, battery.pv_charged_kw)?;
        let surplus_kw = surplus_generation(solar_gen_kw, direct_consumption_kw, battery.pv_charged_kw)
            .map_err(|e| e.at_timestep(t))?;

        // 3. Grid side
        let grid_load_after_solar_kw = load_kw - direct_consumption_kw;
        let grid_load_after_re_kw = (grid_load_after_solar_kw - battery.discharged_kw).max(0.0)
            + battery.grid_charged_kw;

        Ok(HourlyResult {
            timestep: t,
            timestamp: input.timestamp,
            hour,
            solar_gen_kw,
            load_kw,
            direct_consumption_kw,
            surplus_kw,
            grid_load_after_solar_kw,
            grid_load_after_re_kw,
            battery,
        })
    }

    /// Runs every hour in order, then validates the finished trace.
    ///
    /// # Errors
    ///
    /// Returns the first per-step error (tagged with its timestep), or the
    /// aggregate error from the batch energy-balance, SoC-bounds and rating
    /// checks.
    pub fn run(&self, inputs: &[HourlyInput]) -> Result<DispatchTrace> {
        let profile: Vec<f64> = inputs.iter().map(|i| i.simulation_profile_kw).collect();
        let solar = scale_generation(&profile, self.config.scale_factor)?;

        info!(
            steps = inputs.len(),
            capacity_kwh = self.battery.usable_capacity_kwh(),
            power_rating_kw = self.battery.power_rating_kw(),
            strategy = ?self.battery.strategy_mode(),
            bess_enabled = self.config.bess_enabled,
            "starting dispatch run"
        );

        let mut soc = self.config.initial_soc_kwh;
        let mut results = Vec::with_capacity(inputs.len());
        for (t, (input, solar_gen_kw)) in inputs.iter().zip(solar).enumerate() {
            let row = self.step(t, input, solar_gen_kw, soc)?;
            soc = row.battery.soc_kwh;
            results.push(row);
        }

        let trace = DispatchTrace::new(
            results,
            self.config.step_hours,
            self.battery.usable_capacity_kwh(),
        );
        self.validate(&trace)?;

        info!(
            steps = trace.len(),
            final_soc_kwh = soc,
            discharge_hours = trace.battery_states().filter(|s| s.discharged_kw > 0.0).count(),
            overlapping_hours = trace.battery_states().filter(|s| s.conditions.overlapping()).count(),
            "dispatch run complete"
        );
        Ok(trace)
    }

    /// Batch invariant pass over a finished trace.
    fn validate(&self, trace: &DispatchTrace) -> Result<()> {
        let dt = self.config.step_hours;
        let to_kwh = |kw: Vec<f64>| -> Vec<f64> { kw.into_iter().map(|p| p * dt).collect() };

        validate_energy_balance_series(
            &to_kwh(trace.solar_gen_kw()),
            &to_kwh(trace.direct_consumption_kw()),
            &to_kwh(trace.pv_charged_kw()),
            &to_kwh(trace.surplus_kw()),
            BALANCE_TOLERANCE_KWH,
        )?;
        validate_soc_bounds_series(
            &trace.soc_kwh(),
            self.battery.usable_capacity_kwh(),
            SOC_TOLERANCE_KWH,
        )?;
        let charged: Vec<f64> = trace.battery_states().map(BatteryState::charged_kw).collect();
        validate_power_rating_series(
            &charged,
            self.battery.power_rating_kw(),
            "bess charge",
            RATING_TOLERANCE,
        )?;
        validate_power_rating_series(
            &trace.discharged_kw(),
            self.battery.power_rating_kw(),
            "bess discharge",
            RATING_TOLERANCE,
        )
    }

    /// Returns the battery configuration.
    pub fn battery(&self) -> &BatteryConfig {
        &self.battery
    }

    /// Returns the run settings.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tariff(&self) -> &TariffSchedule {
        &self.tariff
    }
}
