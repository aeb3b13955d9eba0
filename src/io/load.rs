//! CSV loaders for hourly input data, degradation tables and tariff schedules.
//!
//! Everything is checked here at the boundary so the engine only ever sees
//! well-formed, non-negative series.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::{DispatchError, Result};
use crate::physics::types::{HOURS_PER_LEAP_YEAR, HOURS_PER_YEAR, TimePeriod};
use crate::projection::DegradationRow;
use crate::sim::tariff::TariffSchedule;
use crate::sim::types::HourlyInput;

const HOURLY_COLUMNS: [&str; 5] = [
    "timestamp",
    "simulation_profile_kw",
    "load_kw",
    "irradiation_wh_m2",
    "market_price",
];

const DEGRADATION_COLUMNS: [&str; 3] = ["year", "pv_factor", "battery_factor_with_replacement"];

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Options for [`read_hourly_csv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Require exactly 8,760 or 8,784 rows.
    pub require_full_year: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            require_full_year: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawHourlyRow {
    #[serde(alias = "datetime")]
    timestamp: String,
    simulation_profile_kw: f64,
    load_kw: f64,
    irradiation_wh_m2: f64,
    market_price: f64,
}

#[derive(Debug, Deserialize)]
struct RawTariffRow {
    hour: u32,
    period: TimePeriod,
}

/// Loads hourly input data from a CSV file.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] if the file cannot be opened or
/// any check in [`read_hourly_csv`] fails.
pub fn load_hourly_csv(path: &Path, options: LoadOptions) -> Result<Vec<HourlyInput>> {
    read_hourly_csv(open(path)?, options)
}

/// Parses hourly input data from any reader.
///
/// Required columns: `timestamp` (or `datetime`), `simulation_profile_kw`,
/// `load_kw`, `irradiation_wh_m2`, `market_price`. Extra columns are ignored.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] naming the missing columns,
/// the first unparsable row, a row count other than 8,760 or 8,784 (when
/// `options.require_full_year`), or the first negative or non-finite value in
/// a physical column.
pub fn read_hourly_csv(reader: impl Read, options: LoadOptions) -> Result<Vec<HourlyInput>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| DispatchError::input("hourly", format!("cannot read header: {e}")))?
        .clone();
    let missing: Vec<&str> = HOURLY_COLUMNS
        .iter()
        .copied()
        .filter(|col| {
            let present = headers.iter().any(|h| h == *col);
            !(present || (*col == "timestamp" && headers.iter().any(|h| h == "datetime")))
        })
        .collect();
    if !missing.is_empty() {
        return Err(DispatchError::input(
            "hourly",
            format!("missing required columns: {missing:?}"),
        ));
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize::<RawHourlyRow>().enumerate() {
        let raw = record.map_err(|e| DispatchError::input("hourly", format!("row {i}: {e}")))?;
        let timestamp = parse_timestamp(&raw.timestamp)
            .ok_or_else(|| DispatchError::input("timestamp", format!("row {i}: cannot parse \"{}\"", raw.timestamp)))?;
        for (field, value) in [
            ("simulation_profile_kw", raw.simulation_profile_kw),
            ("load_kw", raw.load_kw),
            ("irradiation_wh_m2", raw.irradiation_wh_m2),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(DispatchError::input(
                    field,
                    format!("row {i}: must be finite and >= 0, got {value}"),
                ));
            }
        }
        rows.push(HourlyInput {
            timestamp,
            simulation_profile_kw: raw.simulation_profile_kw,
            load_kw: raw.load_kw,
            irradiation_wh_m2: raw.irradiation_wh_m2,
            market_price: raw.market_price,
        });
    }

    if options.require_full_year && rows.len() != HOURS_PER_YEAR && rows.len() != HOURS_PER_LEAP_YEAR {
        return Err(DispatchError::input(
            "hourly",
            format!(
                "expected {HOURS_PER_YEAR} or {HOURS_PER_LEAP_YEAR} rows, got {}; check for leap year or incomplete data",
                rows.len()
            ),
        ));
    }
    Ok(rows)
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Loads a degradation table from a CSV file.
///
/// # Errors
///
/// See [`read_degradation_csv`].
pub fn load_degradation_csv(path: &Path) -> Result<Vec<DegradationRow>> {
    read_degradation_csv(open(path)?)
}

/// Parses a degradation table with columns `year`, `pv_factor` and
/// `battery_factor_with_replacement`.
///
/// Coverage and factor ranges are checked when the table is used for a
/// projection.
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] for missing columns or an
/// unparsable row.
pub fn read_degradation_csv(reader: impl Read) -> Result<Vec<DegradationRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| DispatchError::input("degradation", format!("cannot read header: {e}")))?
        .clone();
    let missing: Vec<&str> = DEGRADATION_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(DispatchError::input(
            "degradation",
            format!("missing required columns: {missing:?}"),
        ));
    }
    rdr.deserialize()
        .enumerate()
        .map(|(i, r)| r.map_err(|e| DispatchError::input("degradation", format!("row {i}: {e}"))))
        .collect()
}

/// Reads a tariff schedule CSV from disk.
///
/// # Errors
///
/// See [`read_tariff_csv`].
pub fn load_tariff_csv(path: &Path) -> Result<TariffSchedule> {
    read_tariff_csv(open(path)?)
}

/// Parses a tariff schedule with columns `hour` and `period`
/// (`off_peak`, `standard` or `peak`).
///
/// # Errors
///
/// Returns [`DispatchError::InputValidation`] for an unparsable row, an
/// unknown period, or any check in [`TariffSchedule::new`].
pub fn read_tariff_csv(reader: impl Read) -> Result<TariffSchedule> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut peak = Vec::new();
    let mut off_peak = Vec::new();
    for (i, record) in rdr.deserialize::<RawTariffRow>().enumerate() {
        let row = record.map_err(|e| DispatchError::input("tariff", format!("row {i}: {e}")))?;
        match row.period {
            TimePeriod::Peak => peak.push(row.hour),
            TimePeriod::OffPeak => off_peak.push(row.hour),
            TimePeriod::Standard => {
                if row.hour > 23 {
                    return Err(DispatchError::input(
                        "tariff",
                        format!("row {i}: hour {} is outside 0..=23", row.hour),
                    ));
                }
            }
        }
    }
    TariffSchedule::new(&peak, &off_peak)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        DispatchError::input("path", format!("cannot open \"{}\": {e}", path.display()))
    })
}
