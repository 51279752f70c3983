use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::fs::File;
use std::path::PathBuf;

use ccsfit::export::write_ciu_rows;
use ccsfit::input::read_ciu_extract_file;
use ccsfit::mapping::{map_ciu, CiuConfig};
use ccsfit::report::RunReport;

use super::map::load_calibration;
use super::{print_report, Config, InstrumentArgs};

#[derive(Args, Debug)]
pub struct CiuArgs {
    /// CIU extract CSV (drift time column followed by one column per collision voltage)
    #[arg(value_name = "EXTRACT_CSV")]
    extract: PathBuf,

    /// Calibration CSV of the analyte
    #[arg(long, value_name = "CSV")]
    calibration: PathBuf,

    /// Charge state of the extract
    #[arg(long, value_name = "Z")]
    charge: u32,

    /// Discard calibration entries with CCS Std.Dev. above this fraction of CCS
    #[arg(long, value_name = "F")]
    max_relative_stddev: Option<f64>,

    #[command(flatten)]
    instrument: InstrumentArgs,

    /// Output CSV
    #[arg(short, long, value_name = "CSV")]
    output: PathBuf,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

pub fn run(args: CiuArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let ciu_config = CiuConfig {
        max_relative_stddev: args
            .max_relative_stddev
            .or(config.mapping.max_relative_stddev)
            .unwrap_or(CiuConfig::default().max_relative_stddev),
        injection_ms: args.instrument.resolve(&config.calibration).injection_ms(),
    };

    let table = load_calibration(std::slice::from_ref(&args.calibration))?;
    let entries = table
        .iter()
        .find(|(key, _)| key.charge == args.charge)
        .map(|(_, entries)| entries)
        .unwrap_or_default();

    let extract = read_ciu_extract_file(&args.extract)
        .with_context(|| format!("Failed to read CIU extract: {}", args.extract.display()))?;
    info!(
        "Extract with {} drift times and {} collision voltages",
        extract.drift_times().len(),
        extract.voltages().len()
    );

    let rows = map_ciu(&extract, entries, &ciu_config)
        .map_err(|reason| anyhow::anyhow!("Charge state {}: {}", args.charge, reason))?;

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_ciu_rows(file, &rows)?;

    let mut report = RunReport::new("CIU Mapping");
    report.processed = rows.len();
    report.detail("Charge", args.charge);
    report.detail("Injection time (ms)", ciu_config.injection_ms);
    report.detail("Output", args.output.display());
    print_report(&report);

    Ok(())
}
