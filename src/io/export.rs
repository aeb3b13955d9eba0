//! CSV export for dispatch trace rows.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::HourlyResult;

/// Column header for trace export. Units are suffix-tagged.
pub const HEADER: &str = "timestep,timestamp,hour,solar_gen_kw,load_kw,direct_consumption_kw,\
                          pv_charged_kw,grid_charged_kw,discharged_kw,surplus_kw,\
                          grid_load_after_solar_kw,grid_load_after_re_kw,soc_kwh,\
                          discharge_permitted,active_conditions";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exports trace rows to a CSV file at the given path.
///
/// Writes a header row followed by one data row per hour. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `results` - Complete trace rows
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[HourlyResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes trace rows as CSV to any writer.
///
/// Active discharge conditions are joined with `|`.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[HourlyResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        let b = &r.battery;
        wtr.write_record(&[
            r.timestep.to_string(),
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            r.hour.to_string(),
            format!("{:.4}", r.solar_gen_kw),
            format!("{:.4}", r.load_kw),
            format!("{:.4}", r.direct_consumption_kw),
            format!("{:.4}", b.pv_charged_kw),
            format!("{:.4}", b.grid_charged_kw),
            format!("{:.4}", b.discharged_kw),
            format!("{:.4}", r.surplus_kw),
            format!("{:.4}", r.grid_load_after_solar_kw),
            format!("{:.4}", r.grid_load_after_re_kw),
            format!("{:.4}", b.soc_kwh),
            b.discharge_permitted.to_string(),
            b.conditions.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::physics::battery::BatteryState;
    use crate::physics::discharge::DischargeConditions;

    fn make_row(t: usize) -> HourlyResult {
        HourlyResult {
            timestep: t,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid timestamp")
                + Duration::hours(t as i64),
            hour: (t % 24) as u32,
            solar_gen_kw: 10.0,
            load_kw: 30.0,
            direct_consumption_kw: 10.0,
            surplus_kw: 0.0,
            grid_load_after_solar_kw: 20.0,
            grid_load_after_re_kw: 0.0,
            battery: BatteryState {
                discharged_kw: 20.0,
                discharge_permitted: true,
                conditions: DischargeConditions {
                    when_needed: true,
                    peak: true,
                    ..DischargeConditions::NONE
                },
                ..BatteryState::idle(40.0)
            },
        }
    }

    fn render(results: &[HourlyResult]) -> String {
        let mut buf = Vec::new();
        write_csv(results, &mut buf).expect("write to vec");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn header_has_unit_suffixed_columns() {
        let output = render(&[make_row(0)]);
        let first_line = output.lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "timestep,timestamp,hour,solar_gen_kw,load_kw,direct_consumption_kw,\
             pv_charged_kw,grid_charged_kw,discharged_kw,surplus_kw,\
             grid_load_after_solar_kw,grid_load_after_re_kw,soc_kwh,\
             discharge_permitted,active_conditions"
        );
    }

    #[test]
    fn row_count_matches_step_count() {
        let results: Vec<HourlyResult> = (0..24).map(make_row).collect();
        // 1 header + 24 data rows
        assert_eq!(render(&results).lines().count(), 25);
    }

    #[test]
    fn deterministic_output() {
        let results: Vec<HourlyResult> = (0..5).map(make_row).collect();
        assert_eq!(render(&results), render(&results));
    }

    #[test]
    fn conditions_joined_with_pipe() {
        let output = render(&[make_row(3)]);
        let row = output.lines().nth(1).unwrap_or("");
        assert!(row.starts_with("3,2024-01-01 03:00:00,3,"));
        assert!(row.ends_with(",40.0000,true,when_needed|peak"));
    }

    #[test]
    fn output_is_parseable() {
        let results: Vec<HourlyResult> = (0..3).map(make_row).collect();
        let output = render(&results);
        let mut rdr = csv::ReaderBuilder::new().from_reader(output.as_bytes());
        let headers = rdr.headers().cloned().expect("header");
        assert_eq!(headers.len(), 15);
        assert_eq!(rdr.records().filter(Result::is_ok).count(), 3);
    }
}
