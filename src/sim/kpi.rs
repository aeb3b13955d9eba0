//! Post-hoc physical totals computed from a dispatch trace.

use std::fmt;

use super::types::HourlyResult;

/// Aggregate energy indicators derived from a complete run.
///
/// Computed post-hoc from the trace rows so reported totals always agree
/// with the per-hour data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiReport {
    /// Total scaled PV generation (kWh).
    pub solar_generation_kwh: f64,
    /// Total site load (kWh).
    pub load_kwh: f64,
    /// PV consumed directly by load (kWh).
    pub direct_consumption_kwh: f64,
    /// PV stored in the battery, before efficiency loss (kWh).
    pub pv_charged_kwh: f64,
    /// Grid energy stored in the battery, before efficiency loss (kWh).
    pub grid_charged_kwh: f64,
    /// Energy delivered by the battery to load (kWh).
    pub discharged_kwh: f64,
    /// PV neither consumed nor stored (kWh).
    pub surplus_kwh: f64,
    /// Charge plus discharge energy (kWh).
    pub battery_throughput_kwh: f64,
    /// Battery equivalent full cycles (throughput / 2*capacity).
    pub battery_equivalent_full_cycles: f64,
    pub min_soc_kwh: f64,
    pub max_soc_kwh: f64,
    /// Hours in which at least one discharge condition held.
    pub discharge_permitted_hours: usize,
    /// Hours in which two or more discharge conditions held at once.
    pub overlapping_condition_hours: usize,
    /// `(direct + discharged) / load`; zero when there is no load.
    pub self_consumption_ratio: f64,
}

impl KpiReport {
    /// Computes all totals from the complete trace rows.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete trace rows
    /// * `step_hours` - Timestep duration in hours
    /// * `capacity_kwh` - Usable battery capacity for the cycle count
    pub fn from_results(results: &[HourlyResult], step_hours: f64, capacity_kwh: f64) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let mut kpi = Self {
            min_soc_kwh: f64::INFINITY,
            max_soc_kwh: f64::NEG_INFINITY,
            ..Self::default()
        };

        for r in results {
            let b = &r.battery;
            kpi.solar_generation_kwh += r.solar_gen_kw * step_hours;
            kpi.load_kwh += r.load_kw * step_hours;
            kpi.direct_consumption_kwh += r.direct_consumption_kw * step_hours;
            kpi.pv_charged_kwh += b.pv_charged_kw * step_hours;
            kpi.grid_charged_kwh += b.grid_charged_kw * step_hours;
            kpi.discharged_kwh += b.discharged_kw * step_hours;
            kpi.surplus_kwh += r.surplus_kw * step_hours;

            kpi.min_soc_kwh = kpi.min_soc_kwh.min(b.soc_kwh);
            kpi.max_soc_kwh = kpi.max_soc_kwh.max(b.soc_kwh);

            if b.discharge_permitted {
                kpi.discharge_permitted_hours += 1;
            }
            if b.conditions.overlapping() {
                kpi.overlapping_condition_hours += 1;
            }
        }

        kpi.battery_throughput_kwh = kpi.pv_charged_kwh + kpi.grid_charged_kwh + kpi.discharged_kwh;
        if capacity_kwh > 0.0 {
            kpi.battery_equivalent_full_cycles = kpi.battery_throughput_kwh / (2.0 * capacity_kwh);
        }
        if kpi.load_kwh > 0.0 {
            kpi.self_consumption_ratio =
                (kpi.direct_consumption_kwh + kpi.discharged_kwh) / kpi.load_kwh;
        }
        kpi
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Solar generation:      {:.2} kWh", self.solar_generation_kwh)?;
        writeln!(f, "Load:                  {:.2} kWh", self.load_kwh)?;
        writeln!(f, "Direct consumption:    {:.2} kWh", self.direct_consumption_kwh)?;
        writeln!(
            f,
            "Battery charged:       {:.2} kWh (pv {:.2}, grid {:.2})",
            self.pv_charged_kwh + self.grid_charged_kwh,
            self.pv_charged_kwh,
            self.grid_charged_kwh
        )?;
        writeln!(f, "Battery discharged:    {:.2} kWh", self.discharged_kwh)?;
        writeln!(f, "Surplus:               {:.2} kWh", self.surplus_kwh)?;
        writeln!(
            f,
            "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.battery_throughput_kwh, self.battery_equivalent_full_cycles
        )?;
        writeln!(
            f,
            "SoC range:             {:.2} .. {:.2} kWh",
            self.min_soc_kwh, self.max_soc_kwh
        )?;
        writeln!(
            f,
            "Discharge permitted:   {} h ({} h with overlapping conditions)",
            self.discharge_permitted_hours, self.overlapping_condition_hours
        )?;
        write!(f, "Self-consumption:      {:.1}%", self.self_consumption_ratio * 100.0)
    }
}
