//! Per-month peak demand roll-up of a dispatch trace.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;

use super::types::HourlyResult;

/// Peak demand seen in one calendar month.
///
/// Rows are grouped by `timestamp.month()`, so a trace spanning more than a
/// year folds the same month of different years together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyPeaks {
    /// Calendar month, 1..=12.
    pub month: u32,
    /// Number of trace rows in the month.
    pub hours: usize,
    /// Highest site load (kW).
    pub baseline_peak_kw: f64,
    /// Highest grid load after direct PV consumption (kW).
    pub peak_demand_after_solar_kw: f64,
    /// Highest grid load after PV and battery, including grid charging (kW).
    pub peak_demand_after_re_kw: f64,
}

impl MonthlyPeaks {
    fn empty(month: u32) -> Self {
        Self {
            month,
            hours: 0,
            baseline_peak_kw: 0.0,
            peak_demand_after_solar_kw: 0.0,
            peak_demand_after_re_kw: 0.0,
        }
    }

    /// Peak reduction of grid demand versus the bare site load (kW).
    pub fn peak_reduction_kw(&self) -> f64 {
        self.baseline_peak_kw - self.peak_demand_after_re_kw
    }
}

/// Rolls trace rows up into one [`MonthlyPeaks`] per month present, ordered
/// by month.
pub fn monthly_peaks(results: &[HourlyResult]) -> Vec<MonthlyPeaks> {
    let mut by_month: BTreeMap<u32, MonthlyPeaks> = BTreeMap::new();
    for r in results {
        let month = r.timestamp.month();
        let m = by_month
            .entry(month)
            .or_insert_with(|| MonthlyPeaks::empty(month));
        m.hours += 1;
        m.baseline_peak_kw = m.baseline_peak_kw.max(r.load_kw);
        m.peak_demand_after_solar_kw = m.peak_demand_after_solar_kw.max(r.grid_load_after_solar_kw);
        m.peak_demand_after_re_kw = m.peak_demand_after_re_kw.max(r.grid_load_after_re_kw);
    }
    by_month.into_values().collect()
}

/// Table view of [`monthly_peaks`] for the binary's report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyReport(pub Vec<MonthlyPeaks>);

impl MonthlyReport {
    pub fn from_results(results: &[HourlyResult]) -> Self {
        Self(monthly_peaks(results))
    }
}

impl fmt::Display for MonthlyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Monthly Peaks ---")?;
        write!(
            f,
            "{:>5}  {:>6}  {:>12}  {:>14}  {:>14}",
            "month", "hours", "load (kW)", "after pv (kW)", "after re (kW)"
        )?;
        for m in &self.0 {
            write!(
                f,
                "\n{:>5}  {:>6}  {:>12.1}  {:>14.1}  {:>14.1}",
                m.month,
                m.hours,
                m.baseline_peak_kw,
                m.peak_demand_after_solar_kw,
                m.peak_demand_after_re_kw
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::physics::battery::BatteryState;

    fn row(t: usize, month: u32, load: f64, after_solar: f64, after_re: f64) -> HourlyResult {
        let timestamp = NaiveDate::from_ymd_opt(2024, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid timestamp")
            + Duration::hours(t as i64);
        HourlyResult {
            timestep: t,
            timestamp,
            hour: 0,
            solar_gen_kw: load - after_solar,
            load_kw: load,
            direct_consumption_kw: load - after_solar,
            surplus_kw: 0.0,
            grid_load_after_solar_kw: after_solar,
            grid_load_after_re_kw: after_re,
            battery: BatteryState::idle(0.0),
        }
    }

    #[test]
    fn groups_by_month_and_takes_maxima() {
        let results = vec![
            row(0, 1, 300.0, 300.0, 250.0),
            row(1, 1, 500.0, 420.0, 380.0),
            row(2, 1, 450.0, 450.0, 400.0),
            row(0, 2, 200.0, 120.0, 90.0),
        ];
        let peaks = monthly_peaks(&results);
        assert_eq!(peaks.len(), 2);

        let jan = peaks[0];
        assert_eq!(jan.month, 1);
        assert_eq!(jan.hours, 3);
        assert_abs_diff_eq!(jan.baseline_peak_kw, 500.0);
        assert_abs_diff_eq!(jan.peak_demand_after_solar_kw, 450.0);
        assert_abs_diff_eq!(jan.peak_demand_after_re_kw, 400.0);
        assert_abs_diff_eq!(jan.peak_reduction_kw(), 100.0);

        assert_eq!(peaks[1].month, 2);
        assert_eq!(peaks[1].hours, 1);
    }

    #[test]
    fn months_are_ordered_regardless_of_row_order() {
        let results = vec![row(0, 11, 1.0, 1.0, 1.0), row(0, 3, 2.0, 2.0, 2.0)];
        let months: Vec<u32> = monthly_peaks(&results).iter().map(|m| m.month).collect();
        assert_eq!(months, vec![3, 11]);
    }

    #[test]
    fn empty_trace_has_no_months() {
        assert!(monthly_peaks(&[]).is_empty());
        let report = MonthlyReport::from_results(&[]);
        assert!(report.to_string().starts_with("--- Monthly Peaks ---"));
    }

    #[test]
    fn report_renders_one_line_per_month() {
        let results = vec![row(0, 1, 10.0, 8.0, 6.0), row(0, 2, 12.0, 9.0, 7.0)];
        let text = MonthlyReport::from_results(&results).to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(2).is_some_and(|l| l.trim_start().starts_with('1')));
    }
}
