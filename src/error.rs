//! Error categories raised by the dispatch engine and its boundary layers.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

/// Every failure the engine can report.
///
/// None of these are recoverable inside the engine: a run that produces one
/// must not feed its trace to settlement or financial layers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// Malformed configuration (non-positive capacity or rating, efficiency outside (0, 1], ...).
    #[error("invalid config: {field} {message}")]
    InvalidConfig { field: String, message: String },

    /// Generation, consumption and storage do not reconcile.
    #[error(
        "energy balance violated at {violations} timestep(s), first at {timestep:?}: \
         {imbalance_kwh:.6} kWh ({message})"
    )]
    EnergyBalance {
        timestep: Option<usize>,
        imbalance_kwh: f64,
        violations: usize,
        message: String,
    },

    /// State of charge left `[0, capacity]` by more than the floating-point tolerance.
    #[error(
        "SoC out of bounds at {violations} timestep(s), first at {timestep:?}: \
         {soc_kwh:.4} kWh (capacity {capacity_kwh:.4} kWh)"
    )]
    SocBounds {
        timestep: Option<usize>,
        soc_kwh: f64,
        capacity_kwh: f64,
        violations: usize,
    },

    /// A power flow exceeded its equipment rating.
    #[error(
        "{equipment} rating exceeded at {violations} timestep(s), first at {timestep:?}: \
         requested {requested_kw:.2} kW, available {available_kw:.2} kW"
    )]
    RatingExceeded {
        equipment: String,
        timestep: Option<usize>,
        requested_kw: f64,
        available_kw: f64,
        violations: usize,
    },

    /// Malformed or missing input values at the boundary.
    #[error("input validation failed for {field}: {message}")]
    InputValidation { field: String, message: String },

    /// The degradation table does not cover the projection horizon.
    #[error("degradation table missing years {missing_years:?}")]
    DegradationTable { missing_years: Vec<u32> },
}

impl DispatchError {
    pub(crate) fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Timestep attached to the error, if any.
    pub fn timestep(&self) -> Option<usize> {
        match self {
            Self::EnergyBalance { timestep, .. }
            | Self::SocBounds { timestep, .. }
            | Self::RatingExceeded { timestep, .. } => *timestep,
            _ => None,
        }
    }

    /// Attaches a timestep to per-step errors that were raised without one.
    #[must_use]
    pub fn at_timestep(mut self, t: usize) -> Self {
        match &mut self {
            Self::EnergyBalance { timestep, .. }
            | Self::SocBounds { timestep, .. }
            | Self::RatingExceeded { timestep, .. } => {
                timestep.get_or_insert(t);
            }
            _ => {}
        }
        self
    }
}
