//! PV + BESS dispatch simulator entry point: CLI wiring and config-driven engine construction.

use std::process;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};

use pv_bess_sim::checks::degradation_coverage_warnings;
use pv_bess_sim::cli::Args;
use pv_bess_sim::config::ScenarioConfig;
use pv_bess_sim::io::export::export_csv;
use pv_bess_sim::io::load::{LoadOptions, load_degradation_csv, load_hourly_csv};
use pv_bess_sim::projection::{
    covers_full_year, project_battery_capacity_kwh, project_generation_mwh,
};
use pv_bess_sim::sim::kpi::KpiReport;
use pv_bess_sim::sim::monthly::MonthlyReport;
use pv_bess_sim::sim::types::{DispatchTrace, HourlyInput};
use pv_bess_sim::telemetry::init_tracing;

fn load_scenario(args: &Args) -> anyhow::Result<ScenarioConfig> {
    let mut cfg = match &args.scenario {
        Some(path) => ScenarioConfig::from_toml_file(path)?,
        None => ScenarioConfig::from_preset(args.preset_or_default())?,
    };
    if let Some(seed) = args.seed {
        cfg.simulation.seed = seed;
    }
    if let Some(hours) = args.hours {
        cfg.synthetic.hours = hours;
    }
    Ok(cfg)
}

fn load_inputs(args: &Args, cfg: &ScenarioConfig) -> anyhow::Result<Vec<HourlyInput>> {
    let mut inputs = match &args.input {
        Some(path) => {
            let options = LoadOptions {
                require_full_year: !args.partial_year,
            };
            load_hourly_csv(path, options)
                .with_context(|| format!("loading hourly input {}", path.display()))?
        }
        None => cfg.synthetic()?.generate(),
    };
    if let Some(hours) = args.hours {
        inputs.truncate(hours);
    }
    if inputs.is_empty() {
        bail!("no hourly input to simulate");
    }
    Ok(inputs)
}

fn print_projection(
    cfg: &ScenarioConfig,
    trace: &DispatchTrace,
    kpi: &KpiReport,
) -> anyhow::Result<()> {
    let Some(path) = &cfg.projection.degradation_csv else {
        return Ok(());
    };
    if !covers_full_year(trace.len(), trace.step_hours()) {
        warn!(
            steps = trace.len(),
            "lifetime projection skipped: year-1 generation needs a full 8760 or 8784 hour run"
        );
        return Ok(());
    }
    let table = load_degradation_csv(path)
        .with_context(|| format!("loading degradation table {}", path.display()))?;
    let proj = &cfg.projection;
    for w in degradation_coverage_warnings(&table, proj.project_years) {
        warn!("{w}");
    }

    let capacity = project_battery_capacity_kwh(
        cfg.battery.usable_capacity_kwh,
        &table,
        proj.replacement_cycle,
        proj.project_years,
    )?;
    let generation =
        project_generation_mwh(kpi.solar_generation_kwh / 1000.0, &table, proj.project_years)?;

    println!();
    println!("--- Lifetime Projection ---");
    println!("{:>4}  {:>14}  {:>16}", "year", "battery (kWh)", "generation (MWh)");
    for (i, (cap, gen_mwh)) in capacity.iter().zip(&generation).enumerate() {
        println!("{:>4}  {cap:>14.1}  {gen_mwh:>16.2}", i + 1);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let cfg = load_scenario(&args)?;

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("config error: {e}");
        }
        process::exit(1);
    }

    let engine = cfg.engine()?;
    let inputs = load_inputs(&args, &cfg)?;

    let trace = engine.run(&inputs)?;
    let capacity = trace.capacity_kwh();
    let kpi = KpiReport::from_results(trace.results(), trace.step_hours(), capacity);

    println!("{kpi}");
    println!();
    println!("{}", MonthlyReport::from_results(trace.results()));

    if let Some(path) = &args.trace_out {
        export_csv(trace.results(), path)
            .with_context(|| format!("writing trace to {}", path.display()))?;
        info!(path = %path.display(), rows = trace.len(), "trace exported");
    }

    print_projection(&cfg, &trace, &kpi)
}
