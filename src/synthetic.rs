//! Seeded synthetic hourly series for demos, presets and tests.

use std::f64::consts::PI;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::{DispatchError, Result};
use crate::physics::types::{HOURS_PER_YEAR, TimePeriod};
use crate::sim::tariff::TariffSchedule;
use crate::sim::types::HourlyInput;

/// Generator for a synthetic year of hourly PV, load, irradiation and price.
///
/// PV follows a half-cosine daylight curve between sunrise and sunset with
/// multiplicative Gaussian noise. Load is a daily sinusoid plus additive
/// noise. Irradiation tracks the PV curve and price tracks the tariff
/// period. The same seed always yields the same series.
///
/// # Examples
///
/// ```
/// use pv_bess_sim::synthetic::SyntheticYear;
///
/// let year = SyntheticYear::builder().hours(48).seed(7).build().expect("valid");
/// let a = year.generate();
/// let b = year.generate();
/// assert_eq!(a.len(), 48);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticYear {
    start: NaiveDateTime,
    hours: usize,
    seed: u64,
    solar_peak_kw: f64,
    sunrise_hour: u32,
    sunset_hour: u32,
    solar_noise_std: f64,
    peak_irradiation_wh_m2: f64,
    load_base_kw: f64,
    load_amp_kw: f64,
    load_phase_rad: f64,
    load_noise_std: f64,
    base_price: f64,
    tariff: TariffSchedule,
}

#[bon::bon]
impl SyntheticYear {
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] when `sunrise_hour >=
    /// sunset_hour`, `sunset_hour > 24`, or a magnitude is negative.
    #[builder]
    pub fn new(
        #[builder(default = default_start())] start: NaiveDateTime,
        #[builder(default = HOURS_PER_YEAR)] hours: usize,
        #[builder(default = 42)] seed: u64,
        #[builder(default = 1000.0)] solar_peak_kw: f64,
        #[builder(default = 6)] sunrise_hour: u32,
        #[builder(default = 19)] sunset_hour: u32,
        #[builder(default = 0.1)] solar_noise_std: f64,
        #[builder(default = 1000.0)] peak_irradiation_wh_m2: f64,
        #[builder(default = 400.0)] load_base_kw: f64,
        #[builder(default = 150.0)] load_amp_kw: f64,
        // peaks around 19:00
        #[builder(default = PI / 2.0 - 2.0 * PI * 19.0 / 24.0)]
        load_phase_rad: f64,
        #[builder(default = 20.0)] load_noise_std: f64,
        #[builder(default = 50.0)] base_price: f64,
        #[builder(default)] tariff: TariffSchedule,
    ) -> Result<Self> {
        if sunrise_hour >= sunset_hour || sunset_hour > 24 {
            return Err(DispatchError::invalid_config(
                "synthetic.sunrise_hour",
                format!("need sunrise < sunset <= 24, got {sunrise_hour}..{sunset_hour}"),
            ));
        }
        for (field, value) in [
            ("synthetic.solar_peak_kw", solar_peak_kw),
            ("synthetic.solar_noise_std", solar_noise_std),
            ("synthetic.peak_irradiation_wh_m2", peak_irradiation_wh_m2),
            ("synthetic.load_base_kw", load_base_kw),
            ("synthetic.load_amp_kw", load_amp_kw),
            ("synthetic.load_noise_std", load_noise_std),
        ] {
            if value < 0.0 || value.is_nan() {
                return Err(DispatchError::invalid_config(field, format!("must be >= 0, got {value}")));
            }
        }
        Ok(Self {
            start,
            hours,
            seed,
            solar_peak_kw,
            sunrise_hour,
            sunset_hour,
            solar_noise_std,
            peak_irradiation_wh_m2,
            load_base_kw,
            load_amp_kw,
            load_phase_rad,
            load_noise_std,
            base_price,
            tariff,
        })
    }
}

impl SyntheticYear {
    /// Generates the full series from a fresh RNG seeded with `seed`.
    pub fn generate(&self) -> Vec<HourlyInput> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.hours)
            .map(|t| {
                let timestamp = self.start + Duration::hours(t as i64);
                let hour = timestamp.hour();
                let frac = self.daylight_frac(hour);

                let (simulation_profile_kw, irradiation_wh_m2) = if frac > 0.0 {
                    let mult = (1.0 + gaussian_noise(&mut rng, self.solar_noise_std)).max(0.0);
                    (
                        self.solar_peak_kw * frac * mult,
                        self.peak_irradiation_wh_m2 * frac * mult,
                    )
                } else {
                    (0.0, 0.0)
                };

                let angle = 2.0 * PI * f64::from(hour) / 24.0 + self.load_phase_rad;
                let load_kw = (self.load_base_kw
                    + self.load_amp_kw * angle.sin()
                    + gaussian_noise(&mut rng, self.load_noise_std))
                .max(0.0);

                let market_price = self.base_price
                    * match self.tariff.period(hour) {
                        TimePeriod::OffPeak => 0.6,
                        TimePeriod::Standard => 1.0,
                        TimePeriod::Peak => 2.0,
                    };

                HourlyInput {
                    timestamp,
                    simulation_profile_kw,
                    load_kw,
                    irradiation_wh_m2,
                    market_price,
                }
            })
            .collect()
    }

    /// Half-cosine daylight shape in [0, 1], zero outside `[sunrise, sunset)`.
    fn daylight_frac(&self, hour: u32) -> f64 {
        if hour < self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let span = f64::from(self.sunset_hour - self.sunrise_hour);
        let pos = (f64::from(hour - self.sunrise_hour) + 0.5) / span;
        (PI * pos).sin()
    }
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}
