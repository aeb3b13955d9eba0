//! Generation-side flows: capacity scaling, direct consumption and surplus.

use crate::error::{DispatchError, Result};
use crate::physics::types::BALANCE_TOLERANCE_KWH;

/// Scales a raw simulation PV profile to the installed capacity.
///
/// `scale_factor` is `actual_capacity / simulation_capacity`.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidConfig`] if `scale_factor` is not positive.
pub fn scale_generation(simulation_profile_kw: &[f64], scale_factor: f64) -> Result<Vec<f64>> {
    if !(scale_factor > 0.0 && scale_factor.is_finite()) {
        return Err(DispatchError::invalid_config(
            "scale_factor",
            format!("must be > 0, got {scale_factor}"),
        ));
    }
    Ok(simulation_profile_kw
        .iter()
        .map(|kw| kw * scale_factor)
        .collect())
}

/// PV power serving the load directly: `min(load, max(solar - pv_to_bess, 0))`.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] if any input is negative.
pub fn direct_pv_consumption(solar_kw: f64, load_kw: f64, pv_to_bess_kw: f64) -> Result<f64> {
    non_negative("solar_gen_kw", solar_kw)?;
    non_negative("load_kw", load_kw)?;
    non_negative("pv_to_bess_kw", pv_to_bess_kw)?;
    Ok(load_kw.min((solar_kw - pv_to_bess_kw).max(0.0)))
}

/// Element-wise [`direct_pv_consumption`] over full series.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] on mismatched lengths or any
/// negative element (the first offending index is reported).
pub fn direct_pv_consumption_series(
    solar_kw: &[f64],
    load_kw: &[f64],
    pv_to_bess_kw: &[f64],
) -> Result<Vec<f64>> {
    same_len(solar_kw.len(), &[("load_kw", load_kw.len()), ("pv_to_bess_kw", pv_to_bess_kw.len())])?;
    for (name, series) in [("solar_gen_kw", solar_kw), ("load_kw", load_kw), ("pv_to_bess_kw", pv_to_bess_kw)] {
        if let Some(i) = series.iter().position(|v| *v < 0.0) {
            return Err(DispatchError::input(
                name,
                format!("contains negative values (first at index {i}: {})", series[i]),
            ));
        }
    }
    Ok(solar_kw
        .iter()
        .zip(load_kw)
        .zip(pv_to_bess_kw)
        .map(|((s, l), p)| l.min((s - p).max(0.0)))
        .collect())
}

/// Solar neither consumed nor stored: `solar - direct - pv_charged`, clamped at 0.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] for a negative input, and
/// [`DispatchError::EnergyBalance`] when the unclamped surplus is below
/// `-BALANCE_TOLERANCE_KWH`, which means energy was counted twice.
pub fn surplus_generation(solar_kw: f64, direct_kw: f64, pv_charged_kw: f64) -> Result<f64> {
    non_negative("solar_gen_kw", solar_kw)?;
    non_negative("direct_consumption_kw", direct_kw)?;
    non_negative("pv_charged_kw", pv_charged_kw)?;

    let surplus = solar_kw - direct_kw - pv_charged_kw;
    if surplus < -BALANCE_TOLERANCE_KWH {
        return Err(DispatchError::EnergyBalance {
            timestep: None,
            imbalance_kwh: surplus,
            violations: 1,
            message: format!(
                "negative surplus: solar={solar_kw}, direct={direct_kw}, charged={pv_charged_kw}"
            ),
        });
    }
    Ok(surplus.max(0.0))
}

/// Element-wise [`surplus_generation`] over full series.
///
/// Scans the whole series before failing so the error carries the number of
/// bad timesteps and the first one.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] on mismatched lengths and
/// [`DispatchError::EnergyBalance`] if any step is below `-tolerance`.
pub fn surplus_generation_series(
    solar_kw: &[f64],
    direct_kw: &[f64],
    pv_charged_kw: &[f64],
    tolerance: f64,
) -> Result<Vec<f64>> {
    same_len(
        solar_kw.len(),
        &[("direct_consumption_kw", direct_kw.len()), ("pv_charged_kw", pv_charged_kw.len())],
    )?;

    let raw: Vec<f64> = solar_kw
        .iter()
        .zip(direct_kw)
        .zip(pv_charged_kw)
        .map(|((s, d), c)| s - d - c)
        .collect();

    let mut violations = 0;
    let mut first: Option<(usize, f64)> = None;
    for (i, surplus) in raw.iter().enumerate() {
        if *surplus < -tolerance {
            violations += 1;
            first.get_or_insert((i, *surplus));
        }
    }
    if let Some((index, surplus)) = first {
        return Err(DispatchError::EnergyBalance {
            timestep: Some(index),
            imbalance_kwh: surplus,
            violations,
            message: "negative surplus".to_owned(),
        });
    }

    Ok(raw.into_iter().map(|s| s.max(0.0)).collect())
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if value < 0.0 || value.is_nan() {
        Err(DispatchError::input(field, format!("cannot be negative: {value}")))
    } else {
        Ok(())
    }
}

pub(crate) fn same_len(expected: usize, others: &[(&str, usize)]) -> Result<()> {
    for (name, len) in others {
        if *len != expected {
            return Err(DispatchError::input(
                *name,
                format!("length {len} does not match expected {expected}"),
            ));
        }
    }
    Ok(())
}
