//! Shared enumerations and constants for the physics layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hours in a standard year.
pub const HOURS_PER_YEAR: usize = 8760;

/// Hours in a leap year.
pub const HOURS_PER_LEAP_YEAR: usize = 8784;

/// Default timestep duration in hours.
pub const DEFAULT_STEP_HOURS: f64 = 1.0;

/// Tolerance separating floating-point noise from a genuine SoC excursion (kWh).
pub const SOC_TOLERANCE_KWH: f64 = 0.01;

/// Tolerance for energy balance checks (kWh per timestep).
pub const BALANCE_TOLERANCE_KWH: f64 = 0.001;

/// Relative overshoot allowed on an equipment rating.
pub const RATING_TOLERANCE: f64 = 0.01;

/// Hour from which the after-sunset discharge condition holds.
pub const SUNSET_HOUR: u32 = 17;

/// High-level objective of battery operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Capture time-of-use price spread.
    #[default]
    Arbitrage,
    /// Keep grid draw below a demand target.
    PeakShaving,
}

/// How and when PV is diverted into the battery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingMode {
    /// Charge inside a fixed hour window.
    #[default]
    TimeWindow,
    /// Charge to reach a target SoC by a given hour.
    PrechargeTarget,
}

/// Whether and how far the battery may charge from the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridChargeMode {
    #[default]
    Disabled,
    /// Charge up to the configured grid-charge capacity.
    ToTarget,
    /// Charge up to the usable capacity.
    ToFull,
}

/// Tariff period of an hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    OffPeak,
    Standard,
    Peak,
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OffPeak => "off_peak",
            Self::Standard => "standard",
            Self::Peak => "peak",
        };
        f.write_str(s)
    }
}

/// Returns true if `hour` lies in the inclusive window `[start, end]`.
///
/// A window with `start > end` wraps midnight (e.g. 22..=6).
pub fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        (start..=end).contains(&hour)
    } else {
        hour >= start || hour <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_window_is_inclusive() {
        assert!(hour_in_window(9, 9, 15));
        assert!(hour_in_window(15, 9, 15));
        assert!(!hour_in_window(16, 9, 15));
        assert!(!hour_in_window(8, 9, 15));
    }

    #[test]
    fn window_wraps_midnight() {
        assert!(hour_in_window(23, 22, 6));
        assert!(hour_in_window(0, 22, 6));
        assert!(hour_in_window(6, 22, 6));
        assert!(!hour_in_window(12, 22, 6));
    }

    #[test]
    fn modes_deserialize_from_snake_case() {
        #[derive(Deserialize)]
        struct Modes {
            strategy: StrategyMode,
            charging: ChargingMode,
            grid: GridChargeMode,
        }
        let m: Modes = toml::from_str(
            "strategy = \"peak_shaving\"\ncharging = \"precharge_target\"\ngrid = \"to_full\"",
        )
        .expect("modes should parse");
        assert_eq!(m.strategy, StrategyMode::PeakShaving);
        assert_eq!(m.charging, ChargingMode::PrechargeTarget);
        assert_eq!(m.grid, GridChargeMode::ToFull);
    }

    #[test]
    fn time_period_display() {
        assert_eq!(TimePeriod::OffPeak.to_string(), "off_peak");
        assert_eq!(TimePeriod::Peak.to_string(), "peak");
    }
}
