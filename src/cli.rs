//! Command-line arguments for the `pv-bess-sim` binary.

use std::path::PathBuf;

use clap::Parser;

const LOGGING_HELP: &str = "\
Logging:
  Events go to stderr, filtered by RUST_LOG (default: info).
  Arbitrage runs with several discharge toggles enabled log one warning per
  hour in which conditions overlap, which can be thousands of lines per year.
  The run summary reports the total as overlapping_hours. To keep only the
  summary, set RUST_LOG=info,pv_bess_sim::physics::discharge=error";

/// Hour-by-hour PV + battery dispatch simulator.
///
/// Without `--scenario` or `--preset` the `baseline` preset is used. Without
/// `--input` a seeded synthetic year is generated from the scenario.
#[derive(Debug, Parser)]
#[command(name = "pv-bess-sim", version, about, after_long_help = LOGGING_HELP)]
pub struct Args {
    /// Load the scenario from a TOML file.
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (baseline, peak_shaving, precharge).
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Hourly input CSV (timestamp, simulation_profile_kw, load_kw,
    /// irradiation_wh_m2, market_price).
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Accept an input CSV that is not a full 8,760 / 8,784-hour year.
    #[arg(long, requires = "input")]
    pub partial_year: bool,

    /// Limit the run to the first N hours.
    #[arg(long, value_name = "N")]
    pub hours: Option<usize>,

    /// Override the synthetic-data seed.
    #[arg(long, env = "PV_BESS_SEED")]
    pub seed: Option<u64>,

    /// Export the dispatch trace to CSV.
    #[arg(long, value_name = "PATH")]
    pub trace_out: Option<PathBuf>,

    /// Log as JSON instead of the compact format.
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    /// Preset to load when no scenario file is given.
    pub fn preset_or_default(&self) -> &str {
        self.preset.as_deref().unwrap_or("baseline")
    }
}
