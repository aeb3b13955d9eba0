//! Time-of-use tariff periods by hour of day.

use crate::error::{DispatchError, Result};
use crate::physics::types::TimePeriod;

/// Maps each hour of day to a [`TimePeriod`].
///
/// Hours listed in neither set are [`TimePeriod::Standard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffSchedule {
    periods: [TimePeriod; 24],
}

impl TariffSchedule {
    /// Builds a schedule from explicit peak and off-peak hours.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InputValidation`] for an hour above 23 or an
    /// hour listed as both peak and off-peak.
    pub fn new(peak_hours: &[u32], off_peak_hours: &[u32]) -> Result<Self> {
        let mut periods = [TimePeriod::Standard; 24];
        for &h in off_peak_hours {
            let slot = slot(&mut periods, h, "off_peak_hours")?;
            *slot = TimePeriod::OffPeak;
        }
        for &h in peak_hours {
            let slot = slot(&mut periods, h, "peak_hours")?;
            if *slot == TimePeriod::OffPeak {
                return Err(DispatchError::input(
                    "peak_hours",
                    format!("hour {h} is also listed as off-peak"),
                ));
            }
            *slot = TimePeriod::Peak;
        }
        Ok(Self { periods })
    }

    /// Period of `hour`; hours past 23 wrap.
    pub fn period(&self, hour: u32) -> TimePeriod {
        self.periods[(hour % 24) as usize]
    }

    pub fn is_peak(&self, hour: u32) -> bool {
        self.period(hour) == TimePeriod::Peak
    }

    /// Hours of the given period, ascending.
    pub fn hours(&self, period: TimePeriod) -> Vec<u32> {
        (0..24).filter(|h| self.period(*h) == period).collect()
    }
}

fn slot<'a>(periods: &'a mut [TimePeriod; 24], hour: u32, field: &str) -> Result<&'a mut TimePeriod> {
    periods
        .get_mut(hour as usize)
        .ok_or_else(|| DispatchError::input(field, format!("hour {hour} is outside 0..=23")))
}

impl Default for TariffSchedule {
    /// Peak 17:00-19:59, off-peak 22:00-03:59.
    fn default() -> Self {
        let mut periods = [TimePeriod::Standard; 24];
        for h in [22, 23, 0, 1, 2, 3] {
            periods[h] = TimePeriod::OffPeak;
        }
        for h in 17..=19 {
            periods[h] = TimePeriod::Peak;
        }
        Self { periods }
    }
}
