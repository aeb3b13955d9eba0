//! Lifetime projection of battery capacity and PV generation from a
//! per-year degradation table.

use serde::Deserialize;

use crate::error::{DispatchError, Result};
use crate::physics::types::{HOURS_PER_LEAP_YEAR, HOURS_PER_YEAR};

/// One year of the degradation (loss) table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DegradationRow {
    /// Project year, starting at 1.
    pub year: u32,
    /// PV output relative to year 1, in (0, 1].
    pub pv_factor: f64,
    /// Battery capacity relative to nameplate after any replacement, in (0, 1].
    pub battery_factor_with_replacement: f64,
}

/// Whether a trace of `rows` steps spans exactly one calendar year, so its
/// totals can stand in for year-1 generation.
pub fn covers_full_year(rows: usize, step_hours: f64) -> bool {
    let hours = rows as f64 * step_hours;
    [HOURS_PER_YEAR, HOURS_PER_LEAP_YEAR]
        .iter()
        .any(|&full| (hours - full as f64).abs() < 1e-6)
}

/// Effective battery capacity for each project year; index 0 is year 1.
///
/// `replacement_cycle` is validated and kept for interface compatibility,
/// but the replacement effect is already folded into
/// `battery_factor_with_replacement`, so it does not change the result.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] for a non-positive capacity or
/// cycle, or a factor outside (0, 1], and [`DispatchError::DegradationTable`]
/// listing the years in `1..=project_years` the table does not cover.
pub fn project_battery_capacity_kwh(
    initial_capacity_kwh: f64,
    table: &[DegradationRow],
    replacement_cycle: u32,
    project_years: u32,
) -> Result<Vec<f64>> {
    if initial_capacity_kwh <= 0.0 || initial_capacity_kwh.is_nan() {
        return Err(DispatchError::input(
            "initial_capacity_kwh",
            format!("must be positive, got {initial_capacity_kwh}"),
        ));
    }
    if replacement_cycle == 0 {
        return Err(DispatchError::input("replacement_cycle", "must be positive"));
    }
    project(table, project_years, |row| initial_capacity_kwh * row.battery_factor_with_replacement)
}

/// PV generation for each project year; index 0 is year 1.
///
/// # Errors
///
/// Same table checks as [`project_battery_capacity_kwh`]; a negative
/// `year1_generation_mwh` is an input error.
pub fn project_generation_mwh(
    year1_generation_mwh: f64,
    table: &[DegradationRow],
    project_years: u32,
) -> Result<Vec<f64>> {
    if year1_generation_mwh < 0.0 || year1_generation_mwh.is_nan() {
        return Err(DispatchError::input(
            "year1_generation_mwh",
            format!("cannot be negative: {year1_generation_mwh}"),
        ));
    }
    project(table, project_years, |row| year1_generation_mwh * row.pv_factor)
}

fn project(
    table: &[DegradationRow],
    project_years: u32,
    value: impl Fn(&DegradationRow) -> f64,
) -> Result<Vec<f64>> {
    validate_table(table, project_years)?;
    (1..=project_years)
        .map(|year| {
            table
                .iter()
                .find(|row| row.year == year)
                .map(&value)
                .ok_or(DispatchError::DegradationTable {
                    missing_years: vec![year],
                })
        })
        .collect()
}

fn validate_table(table: &[DegradationRow], project_years: u32) -> Result<()> {
    if project_years == 0 {
        return Err(DispatchError::input("project_years", "must be positive"));
    }
    for row in table {
        for (field, factor) in [
            ("pv_factor", row.pv_factor),
            ("battery_factor_with_replacement", row.battery_factor_with_replacement),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(DispatchError::input(
                    field,
                    format!("must be within (0, 1], got {factor} in year {}", row.year),
                ));
            }
        }
    }

    let missing_years: Vec<u32> = (1..=project_years)
        .filter(|y| !table.iter().any(|row| row.year == *y))
        .collect();
    if !missing_years.is_empty() {
        return Err(DispatchError::DegradationTable { missing_years });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(8760, 1.0, true)]
    #[case(8784, 1.0, true)]
    #[case(17_520, 0.5, true)]
    #[case(720, 1.0, false)]
    #[case(8759, 1.0, false)]
    #[case(8760, 0.5, false)]
    #[case(0, 1.0, false)]
    fn full_year_detection(#[case] rows: usize, #[case] step_hours: f64, #[case] expected: bool) {
        assert_eq!(covers_full_year(rows, step_hours), expected);
    }

    fn table(years: u32) -> Vec<DegradationRow> {
        (1..=years)
            .map(|year| DegradationRow {
                year,
                pv_factor: 1.0 - 0.005 * f64::from(year - 1),
                battery_factor_with_replacement: if year < 11 {
                    1.0 - 0.02 * f64::from(year - 1)
                } else {
                    1.0 - 0.02 * f64::from(year - 11)
                },
            })
            .collect()
    }

    #[test]
    fn battery_capacity_follows_factors() {
        let caps = project_battery_capacity_kwh(100.0, &table(25), 11, 25).expect("covered");
        assert_eq!(caps.len(), 25);
        assert_abs_diff_eq!(caps[0], 100.0);
        assert_abs_diff_eq!(caps[9], 82.0, epsilon = 1e-9);
        assert_abs_diff_eq!(caps[10], 100.0);
    }

    #[test]
    fn replacement_cycle_does_not_change_result() {
        let a = project_battery_capacity_kwh(100.0, &table(25), 11, 25).expect("covered");
        let b = project_battery_capacity_kwh(100.0, &table(25), 7, 25).expect("covered");
        assert_eq!(a, b);
    }

    #[test]
    fn zero_replacement_cycle_rejected() {
        assert!(matches!(
            project_battery_capacity_kwh(100.0, &table(25), 0, 25),
            Err(DispatchError::InputValidation { .. })
        ));
    }

    #[test]
    fn missing_years_reported() {
        let mut t = table(25);
        t.retain(|r| r.year != 3 && r.year != 20);
        let err = project_battery_capacity_kwh(100.0, &t, 11, 25).expect_err("gaps");
        assert_eq!(err, DispatchError::DegradationTable { missing_years: vec![3, 20] });
    }

    #[test]
    fn factor_out_of_range_rejected() {
        let mut t = table(5);
        t[2].pv_factor = 1.2;
        assert!(project_generation_mwh(1000.0, &t, 5).is_err());
    }

    #[test]
    fn generation_follows_pv_factor() {
        let gen_mwh = project_generation_mwh(1000.0, &table(25), 25).expect("covered");
        assert_abs_diff_eq!(gen_mwh[0], 1000.0);
        assert_abs_diff_eq!(gen_mwh[24], 880.0, epsilon = 1e-9);
    }

    #[test]
    fn shorter_horizon_uses_prefix() {
        let caps = project_battery_capacity_kwh(50.0, &table(25), 11, 3).expect("covered");
        assert_eq!(caps.len(), 3);
    }
}
