//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::Result;
use crate::io::load::load_tariff_csv;
use crate::physics::battery::BatteryConfig;
use crate::physics::types::{ChargingMode, GridChargeMode, HOURS_PER_YEAR, StrategyMode, TimePeriod};
use crate::sim::engine::Engine;
use crate::sim::tariff::TariffSchedule;
use crate::sim::types::SimConfig;
use crate::synthetic::SyntheticYear;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Timestep and initial state.
    #[serde(default)]
    pub simulation: SimulationSection,
    /// PV plant sizing.
    #[serde(default)]
    pub solar: SolarSection,
    /// Battery parameters and dispatch strategy.
    #[serde(default)]
    pub battery: BatterySection,
    /// Hour-of-day tariff periods.
    #[serde(default)]
    pub tariff: TariffSection,
    /// Multi-year capacity projection.
    #[serde(default)]
    pub projection: ProjectionSection,
    /// Synthetic year used when no input CSV is supplied.
    #[serde(default)]
    pub synthetic: SyntheticSection,
}

/// Timestep and initial state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// Duration of one timestep in hours (must be > 0).
    pub step_hours: f64,
    /// SoC before the first timestep (kWh).
    pub initial_soc_kwh: f64,
    /// Seed for the synthetic generator.
    pub seed: u64,
    /// Run with the battery disabled.
    pub bess_enabled: bool,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            step_hours: 1.0,
            initial_soc_kwh: 0.0,
            seed: 42,
            bess_enabled: true,
        }
    }
}

/// PV plant sizing. The hourly profile is scaled by `actual / simulation`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarSection {
    /// Capacity the input profile was simulated for (kWp).
    pub simulation_capacity_kwp: f64,
    /// Installed capacity (kWp).
    pub actual_capacity_kwp: f64,
}

impl Default for SolarSection {
    fn default() -> Self {
        Self {
            simulation_capacity_kwp: 1000.0,
            actual_capacity_kwp: 1000.0,
        }
    }
}

impl SolarSection {
    pub fn scale_factor(&self) -> f64 {
        self.actual_capacity_kwp / self.simulation_capacity_kwp
    }
}

/// Battery parameters and dispatch strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatterySection {
    /// Usable energy capacity (kWh).
    pub usable_capacity_kwh: f64,
    /// Power rating shared by charge and discharge (kW).
    pub power_rating_kw: f64,
    /// Charge efficiency in (0, 1].
    pub charge_efficiency: f64,
    /// Discharge efficiency in (0, 1].
    pub discharge_efficiency: f64,
    pub strategy_mode: StrategyMode,
    pub charging_mode: ChargingMode,
    /// First hour of the PV charging window (inclusive).
    pub charge_start_hour: u32,
    /// Last hour of the PV charging window (inclusive).
    pub charge_end_hour: u32,
    pub precharge_target_hour: u32,
    pub precharge_target_soc_kwh: f64,
    /// Share of PV reserved for direct consumption, in [0, 1].
    pub min_direct_pv_share: f64,
    /// Share of available PV routed to the battery, in [0, 1].
    pub active_pv2bess_share: f64,
    /// Grid demand above which peak shaving discharges (kW).
    pub demand_target_kw: f64,
    pub grid_charge_mode: GridChargeMode,
    pub grid_charge_capacity_kw: f64,
    pub when_needed: bool,
    pub after_sunset: bool,
    pub optimize_mode: bool,
    pub peak_mode: bool,
    pub optimize_start_hour: u32,
    pub optimize_end_hour: u32,
    pub sunday_peak_start_hour: u32,
    pub sunday_peak_end_hour: u32,
}

impl Default for BatterySection {
    fn default() -> Self {
        Self {
            usable_capacity_kwh: 1000.0,
            power_rating_kw: 500.0,
            charge_efficiency: 0.95,
            discharge_efficiency: 0.95,
            strategy_mode: StrategyMode::Arbitrage,
            charging_mode: ChargingMode::TimeWindow,
            charge_start_hour: 9,
            charge_end_hour: 15,
            precharge_target_hour: 17,
            precharge_target_soc_kwh: 0.0,
            min_direct_pv_share: 0.0,
            active_pv2bess_share: 1.0,
            demand_target_kw: 0.0,
            grid_charge_mode: GridChargeMode::Disabled,
            grid_charge_capacity_kw: 0.0,
            when_needed: true,
            after_sunset: false,
            optimize_mode: false,
            peak_mode: true,
            optimize_start_hour: 16,
            optimize_end_hour: 21,
            sunday_peak_start_hour: 17,
            sunday_peak_end_hour: 20,
        }
    }
}

/// Hour-of-day tariff periods. Hours not listed are standard.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffSection {
    pub peak_hours: Vec<u32>,
    pub off_peak_hours: Vec<u32>,
    /// `hour,period` CSV; when set it replaces both hour lists.
    pub schedule_csv: Option<PathBuf>,
}

impl Default for TariffSection {
    fn default() -> Self {
        let tariff = TariffSchedule::default();
        Self {
            peak_hours: tariff.hours(TimePeriod::Peak),
            off_peak_hours: tariff.hours(TimePeriod::OffPeak),
            schedule_csv: None,
        }
    }
}

/// Multi-year capacity projection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectionSection {
    /// Number of project years to project (must be > 0).
    pub project_years: u32,
    /// Battery replacement cycle in years (must be > 0).
    pub replacement_cycle: u32,
    /// Degradation table CSV (`year,pv_factor,battery_factor_with_replacement`).
    pub degradation_csv: Option<PathBuf>,
}

impl Default for ProjectionSection {
    fn default() -> Self {
        Self {
            project_years: 25,
            replacement_cycle: 11,
            degradation_csv: None,
        }
    }
}

/// Synthetic year used when no input CSV is supplied.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticSection {
    /// Number of hours to generate.
    pub hours: usize,
    /// Peak PV output on a clear day (kW).
    pub solar_peak_kw: f64,
    /// Sunrise hour (inclusive).
    pub sunrise_hour: u32,
    /// Sunset hour (exclusive).
    pub sunset_hour: u32,
    /// Multiplicative PV noise standard deviation.
    pub solar_noise_std: f64,
    /// Mean site load (kW).
    pub load_base_kw: f64,
    /// Daily sinusoidal load amplitude (kW).
    pub load_amp_kw: f64,
    /// Additive load noise standard deviation (kW).
    pub load_noise_std: f64,
    /// Standard-period market price.
    pub base_price: f64,
}

impl Default for SyntheticSection {
    fn default() -> Self {
        Self {
            hours: HOURS_PER_YEAR,
            solar_peak_kw: 1000.0,
            sunrise_hour: 6,
            sunset_hour: 19,
            solar_noise_std: 0.1,
            load_base_kw: 400.0,
            load_amp_kw: 150.0,
            load_noise_std: 20.0,
            base_price: 50.0,
        }
    }
}

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ConfigError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Arbitrage with a 09:00-15:00 PV charging window and peak discharge.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Peak shaving against a 450 kW demand target.
    pub fn peak_shaving() -> Self {
        Self {
            battery: BatterySection {
                strategy_mode: StrategyMode::PeakShaving,
                demand_target_kw: 450.0,
                ..BatterySection::default()
            },
            ..Self::default()
        }
    }

    /// Precharge to 80 % by 17:00, topping up from the grid when PV falls short.
    pub fn precharge() -> Self {
        Self {
            battery: BatterySection {
                charging_mode: ChargingMode::PrechargeTarget,
                precharge_target_hour: 17,
                precharge_target_soc_kwh: 800.0,
                grid_charge_mode: GridChargeMode::ToFull,
                grid_charge_capacity_kw: 250.0,
                after_sunset: true,
                ..BatterySection::default()
            },
            ..Self::default()
        }
    }

    /// Names of all built-in presets.
    pub const PRESETS: &[&str] = &["baseline", "peak_shaving", "precharge"];

    /// Loads a built-in preset by name.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> std::result::Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "peak_shaving" => Ok(Self::peak_shaving()),
            "precharge" => Ok(Self::precharge()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", expected one of: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Loads a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::new("file", format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Checks every section and returns all problems found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let sim = &self.simulation;
        if !is_positive(sim.step_hours) {
            errors.push(ConfigError::new("simulation.step_hours", "must be > 0"));
        }
        let bat = &self.battery;
        if sim.initial_soc_kwh < 0.0 || sim.initial_soc_kwh > bat.usable_capacity_kwh {
            errors.push(ConfigError::new(
                "simulation.initial_soc_kwh",
                format!("must be in [0, {}]", bat.usable_capacity_kwh),
            ));
        }

        let sol = &self.solar;
        if !is_positive(sol.simulation_capacity_kwp) {
            errors.push(ConfigError::new("solar.simulation_capacity_kwp", "must be > 0"));
        }
        if !is_positive(sol.actual_capacity_kwp) {
            errors.push(ConfigError::new("solar.actual_capacity_kwp", "must be > 0"));
        }

        if !is_positive(bat.usable_capacity_kwh) {
            errors.push(ConfigError::new("battery.usable_capacity_kwh", "must be > 0"));
        }
        if !is_positive(bat.power_rating_kw) {
            errors.push(ConfigError::new("battery.power_rating_kw", "must be > 0"));
        }
        for (field, eff) in [
            ("battery.charge_efficiency", bat.charge_efficiency),
            ("battery.discharge_efficiency", bat.discharge_efficiency),
        ] {
            if !(eff > 0.0 && eff <= 1.0) {
                errors.push(ConfigError::new(field, "must be in (0, 1]"));
            }
        }
        for (field, share) in [
            ("battery.min_direct_pv_share", bat.min_direct_pv_share),
            ("battery.active_pv2bess_share", bat.active_pv2bess_share),
        ] {
            if !(0.0..=1.0).contains(&share) {
                errors.push(ConfigError::new(field, "must be in [0, 1]"));
            }
        }
        for (field, value) in [
            ("battery.demand_target_kw", bat.demand_target_kw),
            ("battery.grid_charge_capacity_kw", bat.grid_charge_capacity_kw),
            ("battery.precharge_target_soc_kwh", bat.precharge_target_soc_kwh),
        ] {
            if value < 0.0 || value.is_nan() {
                errors.push(ConfigError::new(field, "must be >= 0"));
            }
        }
        if bat.precharge_target_soc_kwh > bat.usable_capacity_kwh {
            errors.push(ConfigError::new(
                "battery.precharge_target_soc_kwh",
                "must be <= battery.usable_capacity_kwh",
            ));
        }
        for (field, hour) in [
            ("battery.charge_start_hour", bat.charge_start_hour),
            ("battery.charge_end_hour", bat.charge_end_hour),
            ("battery.precharge_target_hour", bat.precharge_target_hour),
            ("battery.optimize_start_hour", bat.optimize_start_hour),
            ("battery.optimize_end_hour", bat.optimize_end_hour),
            ("battery.sunday_peak_start_hour", bat.sunday_peak_start_hour),
            ("battery.sunday_peak_end_hour", bat.sunday_peak_end_hour),
        ] {
            if hour > 23 {
                errors.push(ConfigError::new(field, format!("must be in 0..=23, got {hour}")));
            }
        }

        let tar = &self.tariff;
        for (field, hours) in [
            ("tariff.peak_hours", &tar.peak_hours),
            ("tariff.off_peak_hours", &tar.off_peak_hours),
        ] {
            if let Some(h) = hours.iter().find(|h| **h > 23) {
                errors.push(ConfigError::new(field, format!("hour {h} outside 0..=23")));
            }
        }
        if let Some(h) = tar.peak_hours.iter().find(|h| tar.off_peak_hours.contains(h)) {
            errors.push(ConfigError::new(
                "tariff.peak_hours",
                format!("hour {h} is also listed as off-peak"),
            ));
        }

        let proj = &self.projection;
        if proj.project_years == 0 {
            errors.push(ConfigError::new("projection.project_years", "must be > 0"));
        }
        if proj.replacement_cycle == 0 {
            errors.push(ConfigError::new("projection.replacement_cycle", "must be > 0"));
        }

        let syn = &self.synthetic;
        if syn.sunrise_hour >= syn.sunset_hour || syn.sunset_hour > 24 {
            errors.push(ConfigError::new(
                "synthetic.sunset_hour",
                "need sunrise_hour < sunset_hour <= 24",
            ));
        }

        errors
    }

    /// Builds the immutable battery configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DispatchError::InvalidConfig`] for the first invalid
    /// battery field.
    pub fn battery_config(&self) -> Result<BatteryConfig> {
        let b = &self.battery;
        BatteryConfig::builder()
            .usable_capacity_kwh(b.usable_capacity_kwh)
            .power_rating_kw(b.power_rating_kw)
            .charge_efficiency(b.charge_efficiency)
            .discharge_efficiency(b.discharge_efficiency)
            .strategy_mode(b.strategy_mode)
            .charging_mode(b.charging_mode)
            .charge_start_hour(b.charge_start_hour)
            .charge_end_hour(b.charge_end_hour)
            .precharge_target_hour(b.precharge_target_hour)
            .precharge_target_soc_kwh(b.precharge_target_soc_kwh)
            .min_direct_pv_share(b.min_direct_pv_share)
            .active_pv2bess_share(b.active_pv2bess_share)
            .demand_target_kw(b.demand_target_kw)
            .grid_charge_mode(b.grid_charge_mode)
            .grid_charge_capacity_kw(b.grid_charge_capacity_kw)
            .when_needed(b.when_needed)
            .after_sunset(b.after_sunset)
            .optimize_mode(b.optimize_mode)
            .peak_mode(b.peak_mode)
            .optimize_start_hour(b.optimize_start_hour)
            .optimize_end_hour(b.optimize_end_hour)
            .sunday_peak_start_hour(b.sunday_peak_start_hour)
            .sunday_peak_end_hour(b.sunday_peak_end_hour)
            .build()
    }

    /// # Errors
    ///
    /// Returns [`crate::DispatchError::InvalidConfig`] for a bad step, scale or SoC.
    pub fn sim_config(&self) -> Result<SimConfig> {
        SimConfig::new(
            self.simulation.step_hours,
            self.simulation.initial_soc_kwh,
            self.solar.scale_factor(),
            self.simulation.bess_enabled,
        )
    }

    /// Tariff schedule from `tariff.schedule_csv` when set, otherwise from the
    /// inline hour lists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DispatchError::InputValidation`] for out-of-range or
    /// conflicting hours, or a schedule file that cannot be read.
    pub fn tariff(&self) -> Result<TariffSchedule> {
        match &self.tariff.schedule_csv {
            Some(path) => load_tariff_csv(path),
            None => TariffSchedule::new(&self.tariff.peak_hours, &self.tariff.off_peak_hours),
        }
    }

    /// Assembles a ready-to-run engine from every section.
    ///
    /// # Errors
    ///
    /// Propagates the first error from the battery, simulation or tariff
    /// sections.
    pub fn engine(&self) -> Result<Engine> {
        Engine::new(self.sim_config()?, self.battery_config()?, self.tariff()?)
    }

    /// Synthetic year generator seeded from `simulation.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DispatchError`] for invalid synthetic or tariff settings.
    pub fn synthetic(&self) -> Result<SyntheticYear> {
        let s = &self.synthetic;
        SyntheticYear::builder()
            .hours(s.hours)
            .seed(self.simulation.seed)
            .solar_peak_kw(s.solar_peak_kw)
            .sunrise_hour(s.sunrise_hour)
            .sunset_hour(s.sunset_hour)
            .solar_noise_std(s.solar_noise_std)
            .load_base_kw(s.load_base_kw)
            .load_amp_kw(s.load_amp_kw)
            .load_noise_std(s.load_noise_std)
            .base_price(s.base_price)
            .tariff(self.tariff()?)
            .build()
    }
}

fn is_positive(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}
