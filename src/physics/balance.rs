//! Invariant validators: energy balance, SoC bounds and equipment ratings.
//!
//! Scalar forms check one timestep. Batch forms scan a whole trace once,
//! count every violation, and fail with a single aggregate error naming the
//! first offending index. None of them mutate their input, so batch passes
//! over a finished trace can run in any order.

use tracing::error;

use crate::error::{DispatchError, Result};
use crate::physics::solar::same_len;

/// Checks `solar = direct + charged + surplus` within `tolerance` (kWh).
///
/// # Errors
///
/// Returns [`DispatchError::EnergyBalance`] with the signed imbalance.
pub fn validate_energy_balance(
    solar_kwh: f64,
    direct_kwh: f64,
    charged_kwh: f64,
    surplus_kwh: f64,
    tolerance: f64,
    timestep: Option<usize>,
) -> Result<()> {
    let accounted = direct_kwh + charged_kwh + surplus_kwh;
    let imbalance = solar_kwh - accounted;
    if imbalance.abs() > tolerance || imbalance.is_nan() {
        return Err(DispatchError::EnergyBalance {
            timestep,
            imbalance_kwh: imbalance,
            violations: 1,
            message: format!(
                "solar={solar_kwh:.4}, direct={direct_kwh:.4}, charged={charged_kwh:.4}, \
                 surplus={surplus_kwh:.4}, expected sum={accounted:.4}"
            ),
        });
    }
    Ok(())
}

/// Batch form of [`validate_energy_balance`].
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] on mismatched lengths, or
/// [`DispatchError::EnergyBalance`] carrying the violation count, the first
/// offending index and its imbalance.
pub fn validate_energy_balance_series(
    solar_kwh: &[f64],
    direct_kwh: &[f64],
    charged_kwh: &[f64],
    surplus_kwh: &[f64],
    tolerance: f64,
) -> Result<()> {
    same_len(
        solar_kwh.len(),
        &[
            ("direct_consumption_kwh", direct_kwh.len()),
            ("charged_kwh", charged_kwh.len()),
            ("surplus_kwh", surplus_kwh.len()),
        ],
    )?;

    let mut violations = 0;
    let mut first: Option<(usize, f64)> = None;
    let mut worst = 0.0_f64;
    for i in 0..solar_kwh.len() {
        let imbalance = solar_kwh[i] - (direct_kwh[i] + charged_kwh[i] + surplus_kwh[i]);
        if imbalance.abs() > tolerance || imbalance.is_nan() {
            violations += 1;
            first.get_or_insert((i, imbalance));
            worst = worst.max(imbalance.abs());
        }
    }

    match first {
        None => Ok(()),
        Some((index, imbalance)) => {
            error!(violations, first = index, imbalance, worst, "energy balance check failed");
            Err(DispatchError::EnergyBalance {
                timestep: Some(index),
                imbalance_kwh: imbalance,
                violations,
                message: format!("maximum imbalance {worst:.6} kWh"),
            })
        }
    }
}

/// Checks `0 <= soc <= capacity` within `tolerance` (kWh).
///
/// # Errors
///
/// Returns [`DispatchError::SocBounds`] with the offending value.
pub fn validate_soc_bounds(
    soc_kwh: f64,
    capacity_kwh: f64,
    tolerance: f64,
    timestep: Option<usize>,
) -> Result<()> {
    if soc_out_of_bounds(soc_kwh, capacity_kwh, tolerance) {
        return Err(DispatchError::SocBounds {
            timestep,
            soc_kwh,
            capacity_kwh,
            violations: 1,
        });
    }
    Ok(())
}

/// Batch form of [`validate_soc_bounds`].
///
/// # Errors
///
/// Returns [`DispatchError::SocBounds`] carrying the violation count (both
/// directions), the first offending index and its value.
pub fn validate_soc_bounds_series(soc_kwh: &[f64], capacity_kwh: f64, tolerance: f64) -> Result<()> {
    let mut violations = 0;
    let mut first: Option<(usize, f64)> = None;
    for (i, soc) in soc_kwh.iter().enumerate() {
        if soc_out_of_bounds(*soc, capacity_kwh, tolerance) {
            violations += 1;
            first.get_or_insert((i, *soc));
        }
    }

    match first {
        None => Ok(()),
        Some((index, soc)) => {
            error!(violations, first = index, soc, capacity_kwh, "SoC bounds check failed");
            Err(DispatchError::SocBounds {
                timestep: Some(index),
                soc_kwh: soc,
                capacity_kwh,
                violations,
            })
        }
    }
}

fn soc_out_of_bounds(soc_kwh: f64, capacity_kwh: f64, tolerance: f64) -> bool {
    soc_kwh < -tolerance || soc_kwh > capacity_kwh + tolerance || soc_kwh.is_nan()
}

/// Checks `power <= rating * (1 + tolerance)`; `tolerance` is a ratio.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] if `rating_kw` is not positive,
/// and [`DispatchError::RatingExceeded`] with requested vs. available power.
pub fn validate_power_rating(
    power_kw: f64,
    rating_kw: f64,
    equipment: &str,
    tolerance: f64,
    timestep: Option<usize>,
) -> Result<()> {
    check_rating(rating_kw)?;
    if power_kw > rating_kw * (1.0 + tolerance) {
        return Err(DispatchError::RatingExceeded {
            equipment: equipment.to_owned(),
            timestep,
            requested_kw: power_kw,
            available_kw: rating_kw,
            violations: 1,
        });
    }
    Ok(())
}

/// Batch form of [`validate_power_rating`].
///
/// # Errors
///
/// Same as the scalar form, with the violation count and first offending
/// index attached.
pub fn validate_power_rating_series(
    power_kw: &[f64],
    rating_kw: f64,
    equipment: &str,
    tolerance: f64,
) -> Result<()> {
    check_rating(rating_kw)?;
    let allowable = rating_kw * (1.0 + tolerance);

    let mut violations = 0;
    let mut first: Option<(usize, f64)> = None;
    for (i, kw) in power_kw.iter().enumerate() {
        if *kw > allowable {
            violations += 1;
            first.get_or_insert((i, *kw));
        }
    }

    match first {
        None => Ok(()),
        Some((index, kw)) => {
            error!(equipment, violations, first = index, kw, rating_kw, "power rating check failed");
            Err(DispatchError::RatingExceeded {
                equipment: equipment.to_owned(),
                timestep: Some(index),
                requested_kw: kw,
                available_kw: rating_kw,
                violations,
            })
        }
    }
}

fn check_rating(rating_kw: f64) -> Result<()> {
    if rating_kw > 0.0 {
        Ok(())
    } else {
        Err(DispatchError::input("rating_kw", format!("must be positive, got {rating_kw}")))
    }
}
