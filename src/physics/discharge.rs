//! Discharge permission and discharge power sizing.

use std::fmt;

use tracing::warn;

use crate::physics::battery::BatteryConfig;
use crate::physics::types::{SUNSET_HOUR, StrategyMode, hour_in_window};

/// One independently toggled reason the battery may discharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DischargeCondition {
    /// Load exceeds solar (arbitrage), or grid load exceeds the demand target (peak shaving).
    WhenNeeded,
    /// Hour is at or after sunset.
    AfterSunset,
    /// Hour is inside the optimize window, or a peak tariff period.
    Optimize,
    /// Peak tariff period, or the Sunday peak window.
    Peak,
}

impl DischargeCondition {
    /// All conditions in canonical order.
    pub const ALL: [Self; 4] = [Self::WhenNeeded, Self::AfterSunset, Self::Optimize, Self::Peak];

    pub const fn name(self) -> &'static str {
        match self {
            Self::WhenNeeded => "when_needed",
            Self::AfterSunset => "after_sunset",
            Self::Optimize => "optimize",
            Self::Peak => "peak",
        }
    }
}

impl fmt::Display for DischargeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of discharge conditions that held during one timestep.
///
/// Each flag is evaluated on its own; the union decides permission, while
/// the full set stays available for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DischargeConditions {
    pub when_needed: bool,
    pub after_sunset: bool,
    pub optimize: bool,
    pub peak: bool,
}

impl DischargeConditions {
    /// No condition active.
    pub const NONE: Self = Self {
        when_needed: false,
        after_sunset: false,
        optimize: false,
        peak: false,
    };

    pub const fn contains(&self, condition: DischargeCondition) -> bool {
        match condition {
            DischargeCondition::WhenNeeded => self.when_needed,
            DischargeCondition::AfterSunset => self.after_sunset,
            DischargeCondition::Optimize => self.optimize,
            DischargeCondition::Peak => self.peak,
        }
    }

    pub const fn any_active(&self) -> bool {
        self.when_needed || self.after_sunset || self.optimize || self.peak
    }

    pub fn count_active(&self) -> usize {
        self.active().count()
    }

    /// Active conditions in canonical order.
    pub fn active(&self) -> impl Iterator<Item = DischargeCondition> + '_ {
        DischargeCondition::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
    }

    /// True when more than one condition fired at once.
    pub fn overlapping(&self) -> bool {
        self.count_active() > 1
    }
}

impl fmt::Display for DischargeConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in self.active() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(c.name())?;
            first = false;
        }
        Ok(())
    }
}

/// Evaluates which discharge conditions hold at this hour.
///
/// Peak shaving has a single condition: grid load after solar above the
/// demand target. Arbitrage OR-combines four toggled conditions; when more
/// than one fires, a warning event is emitted. The warning never changes the
/// returned set.
pub fn evaluate_discharge_permission(
    hour: u32,
    load_kw: f64,
    solar_kw: f64,
    grid_load_after_solar_kw: f64,
    config: &BatteryConfig,
    is_peak: bool,
    is_sunday: bool,
) -> DischargeConditions {
    if config.strategy_mode() == StrategyMode::PeakShaving {
        return DischargeConditions {
            when_needed: grid_load_after_solar_kw > config.demand_target_kw(),
            ..DischargeConditions::NONE
        };
    }

    let (opt_start, opt_end) = config.optimize_window();
    let (sun_start, sun_end) = config.sunday_peak_window();

    let conditions = DischargeConditions {
        when_needed: config.condition_enabled(DischargeCondition::WhenNeeded) && load_kw > solar_kw,
        after_sunset: config.condition_enabled(DischargeCondition::AfterSunset)
            && hour >= SUNSET_HOUR,
        optimize: config.condition_enabled(DischargeCondition::Optimize)
            && (hour_in_window(hour, opt_start, opt_end) || is_peak),
        peak: config.condition_enabled(DischargeCondition::Peak)
            && (is_peak || (is_sunday && hour_in_window(hour, sun_start, sun_end))),
    };

    if conditions.overlapping() {
        warn!(
            hour,
            conditions = %conditions,
            "multiple discharge conditions active; review dispatch strategy for unintended overlap"
        );
    }

    conditions
}

/// Discharge power for one step, bounded by unmet load, SoC and inverter rating.
///
/// Returns zero when discharge is not permitted, the battery is empty, or
/// solar left after PV charging already covers the load. `step_hours` must be
/// positive.
pub fn discharge_power(
    load_kw: f64,
    solar_kw: f64,
    pv_to_bess_kw: f64,
    soc_kwh: f64,
    config: &BatteryConfig,
    permitted: bool,
    step_hours: f64,
) -> f64 {
    if !permitted || soc_kwh <= 0.0 {
        return 0.0;
    }

    let pv_for_load = (solar_kw - pv_to_bess_kw).max(0.0);
    let unmet_load_kw = (load_kw - pv_for_load).max(0.0);
    if unmet_load_kw <= 0.0 {
        return 0.0;
    }

    let deliverable_kw =
        (soc_kwh * config.discharge_efficiency() / step_hours).min(config.power_rating_kw());
    unmet_load_kw.min(deliverable_kw)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    /// Log sink shared between the subscriber and the test body.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer lock").extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` under a thread-local WARN-level subscriber and returns what it logged.
    fn captured_warnings(f: impl FnOnce()) -> String {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().expect("log buffer lock").clone();
        String::from_utf8(bytes).expect("utf-8 log output")
    }

    fn arbitrage() -> BatteryConfig {
        BatteryConfig::builder()
            .usable_capacity_kwh(100.0)
            .power_rating_kw(50.0)
            .build()
            .expect("valid config")
    }

    fn all_toggles() -> BatteryConfig {
        BatteryConfig::builder()
            .usable_capacity_kwh(100.0)
            .power_rating_kw(50.0)
            .when_needed(true)
            .after_sunset(true)
            .optimize_mode(true)
            .peak_mode(true)
            .build()
            .expect("valid config")
    }

    fn peak_shaving() -> BatteryConfig {
        BatteryConfig::builder()
            .usable_capacity_kwh(100.0)
            .power_rating_kw(50.0)
            .strategy_mode(StrategyMode::PeakShaving)
            .demand_target_kw(80.0)
            .build()
            .expect("valid config")
    }

    #[test]
    fn peak_shaving_above_target_permits() {
        let c = evaluate_discharge_permission(14, 100.0, 0.0, 100.0, &peak_shaving(), false, false);
        assert!(c.any_active());
        assert!(c.when_needed);
        assert_eq!(c.count_active(), 1);
    }

    #[test]
    fn peak_shaving_below_target_denies() {
        let c = evaluate_discharge_permission(18, 70.0, 0.0, 70.0, &peak_shaving(), true, false);
        assert!(!c.any_active());
    }

    #[test]
    fn when_needed_permits_when_load_exceeds_solar() {
        let c = evaluate_discharge_permission(10, 50.0, 20.0, 30.0, &arbitrage(), false, false);
        assert!(c.when_needed);
        assert!(c.any_active());
    }

    #[test]
    fn when_needed_denies_when_solar_covers_load() {
        let c = evaluate_discharge_permission(10, 20.0, 50.0, 0.0, &arbitrage(), false, false);
        assert!(!c.any_active());
    }

    #[rstest]
    #[case(16, false)]
    #[case(17, true)]
    #[case(23, true)]
    fn after_sunset_from_hour_17(#[case] hour: u32, #[case] expected: bool) {
        let c = BatteryConfig::builder()
            .usable_capacity_kwh(100.0)
            .power_rating_kw(50.0)
            .when_needed(false)
            .peak_mode(false)
            .after_sunset(true)
            .build()
            .expect("valid config");
        let conds = evaluate_discharge_permission(hour, 0.0, 0.0, 0.0, &c, false, false);
        assert_eq!(conds.after_sunset, expected);
    }

    #[test]
    fn optimize_window_or_peak() {
        let c = BatteryConfig::builder()
            .usable_capacity_kwh(100.0)
            .power_rating_kw(50.0)
            .when_needed(false)
            .peak_mode(false)
            .optimize_mode(true)
            .build()
            .expect("valid config");
        assert!(evaluate_discharge_permission(16, 0.0, 0.0, 0.0, &c, false, false).optimize);
        assert!(evaluate_discharge_permission(21, 0.0, 0.0, 0.0, &c, false, false).optimize);
        assert!(!evaluate_discharge_permission(10, 0.0, 0.0, 0.0, &c, false, false).optimize);
        assert!(evaluate_discharge_permission(10, 0.0, 0.0, 0.0, &c, true, false).optimize);
    }

    #[test]
    fn peak_mode_during_peak_period() {
        let c = evaluate_discharge_permission(18, 0.0, 0.0, 0.0, &arbitrage(), true, false);
        assert!(c.peak);
        assert_eq!(c.active().collect::<Vec<_>>(), vec![DischargeCondition::Peak]);
    }

    #[test]
    fn peak_mode_sunday_window() {
        let sunday = evaluate_discharge_permission(18, 0.0, 0.0, 0.0, &arbitrage(), false, true);
        assert!(sunday.peak);
        let weekday = evaluate_discharge_permission(18, 0.0, 0.0, 0.0, &arbitrage(), false, false);
        assert!(!weekday.peak);
        let sunday_morning = evaluate_discharge_permission(9, 0.0, 0.0, 0.0, &arbitrage(), false, true);
        assert!(!sunday_morning.peak);
    }

    #[test]
    fn disabled_toggles_never_fire() {
        let c = BatteryConfig::builder()
            .usable_capacity_kwh(100.0)
            .power_rating_kw(50.0)
            .when_needed(false)
            .peak_mode(false)
            .build()
            .expect("valid config");
        let conds = evaluate_discharge_permission(18, 100.0, 0.0, 100.0, &c, true, true);
        assert!(!conds.any_active());
    }

    #[test]
    fn overlapping_conditions_are_reported_not_raised() {
        let conds = evaluate_discharge_permission(18, 80.0, 10.0, 70.0, &all_toggles(), true, false);
        assert_eq!(conds.count_active(), 4);
        assert!(conds.overlapping());
        assert!(conds.any_active());
        assert_eq!(conds.to_string(), "when_needed|after_sunset|optimize|peak");
    }

    #[test]
    fn overlap_emits_one_warning_with_hour_and_conditions() {
        let logs = captured_warnings(|| {
            evaluate_discharge_permission(18, 80.0, 10.0, 70.0, &all_toggles(), true, false);
        });
        let warnings: Vec<&str> = logs.lines().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warnings.len(), 1, "{logs}");
        let line = warnings[0];
        assert!(line.contains("multiple discharge conditions active"), "{line}");
        assert!(line.contains("hour=18"), "{line}");
        assert!(line.contains("conditions=when_needed|after_sunset|optimize|peak"), "{line}");
    }

    #[test]
    fn single_condition_logs_nothing() {
        let logs = captured_warnings(|| {
            let c = evaluate_discharge_permission(10, 50.0, 20.0, 30.0, &arbitrage(), false, false);
            assert_eq!(c.count_active(), 1);
        });
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn peak_shaving_never_warns() {
        let logs = captured_warnings(|| {
            evaluate_discharge_permission(18, 100.0, 0.0, 100.0, &peak_shaving(), true, true);
        });
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn no_discharge_without_permission() {
        assert_eq!(discharge_power(50.0, 0.0, 0.0, 100.0, &arbitrage(), false, 1.0), 0.0);
    }

    #[test]
    fn no_discharge_when_empty() {
        assert_eq!(discharge_power(50.0, 0.0, 0.0, 0.0, &arbitrage(), true, 1.0), 0.0);
    }

    #[test]
    fn no_discharge_when_solar_meets_load() {
        assert_eq!(discharge_power(50.0, 60.0, 0.0, 100.0, &arbitrage(), true, 1.0), 0.0);
    }

    #[test]
    fn discharge_limited_by_unmet_load() {
        let kw = discharge_power(30.0, 10.0, 0.0, 100.0, &arbitrage(), true, 1.0);
        assert_abs_diff_eq!(kw, 20.0);
    }

    #[test]
    fn pv_diversion_increases_unmet_load() {
        let kw = discharge_power(30.0, 10.0, 10.0, 100.0, &arbitrage(), true, 1.0);
        assert_abs_diff_eq!(kw, 30.0);
    }

    #[test]
    fn discharge_limited_by_inverter_rating() {
        let kw = discharge_power(200.0, 0.0, 0.0, 100.0, &arbitrage(), true, 1.0);
        assert_abs_diff_eq!(kw, 50.0);
    }

    #[test]
    fn discharge_limited_by_soc() {
        let kw = discharge_power(200.0, 0.0, 0.0, 10.0, &arbitrage(), true, 1.0);
        assert_abs_diff_eq!(kw, 9.5);
    }

    proptest! {
        #[test]
        fn discharge_never_exceeds_unmet_load_or_rating(
            load in 0.0f64..500.0,
            solar in 0.0f64..500.0,
            pv_frac in 0.0f64..=1.0,
            soc in 0.0f64..=100.0,
            permitted: bool,
        ) {
            let pv_to_bess = solar * pv_frac;
            let kw = discharge_power(load, solar, pv_to_bess, soc, &arbitrage(), permitted, 1.0);
            let unmet = (load - (solar - pv_to_bess).max(0.0)).max(0.0);
            prop_assert!(kw >= 0.0);
            prop_assert!(kw <= unmet.min(50.0) + 1e-12);
        }
    }
}
