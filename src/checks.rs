//! Non-fatal review checks.
//!
//! These run the same validators the engine uses but turn failures into
//! human-readable warnings, so a finished trace can be reviewed without
//! aborting.

use crate::physics::balance::{validate_energy_balance_series, validate_soc_bounds_series};
use crate::projection::DegradationRow;
use crate::sim::types::DispatchTrace;

/// Energy-balance and SoC-bounds warnings for a finished trace.
///
/// `tolerance` applies to both checks (kWh). Returns an empty list when the
/// trace is clean.
pub fn trace_warnings(trace: &DispatchTrace, capacity_kwh: f64, tolerance: f64) -> Vec<String> {
    let dt = trace.step_hours();
    let kwh = |kw: Vec<f64>| -> Vec<f64> { kw.into_iter().map(|p| p * dt).collect() };

    let mut warnings = Vec::new();
    if let Err(e) = validate_energy_balance_series(
        &kwh(trace.solar_gen_kw()),
        &kwh(trace.direct_consumption_kw()),
        &kwh(trace.pv_charged_kw()),
        &kwh(trace.surplus_kw()),
        tolerance,
    ) {
        warnings.push(e.to_string());
    }
    if capacity_kwh <= 0.0 {
        warnings.push(format!("SoC bounds not checked: capacity must be positive, got {capacity_kwh}"));
    } else if let Err(e) = validate_soc_bounds_series(&trace.soc_kwh(), capacity_kwh, tolerance) {
        warnings.push(format!("SoC bounds violation: {e}"));
    }
    warnings
}

/// Warns when the degradation table does not cover years `1..=project_years`.
pub fn degradation_coverage_warnings(table: &[DegradationRow], project_years: u32) -> Vec<String> {
    let missing: Vec<u32> = (1..=project_years)
        .filter(|y| !table.iter().any(|row| row.year == *y))
        .collect();
    if missing.is_empty() {
        Vec::new()
    } else {
        vec![format!(
            "degradation table missing years {missing:?}; coverage must include 1..={project_years}"
        )]
    }
}
