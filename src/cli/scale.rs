use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

use ccsfit::export::write_scaled_rows;
use ccsfit::input::read_mass_spectrum_file;
use ccsfit::mapping::{CcsRow, ChargeStateScaler};
use ccsfit::report::RunReport;

use super::{print_report, Config, ScalingConfig};

#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// Mapped CCS CSV (Charge, Drift, CCS, CCS Std.Dev., Intensity)
    #[arg(value_name = "CCS_CSV")]
    ccs_csv: PathBuf,

    /// Two-column mass spectrum (m/z, intensity)
    #[arg(long, value_name = "TXT")]
    mass_spectrum: PathBuf,

    /// Molecular mass of the analyte (Da)
    #[arg(long, value_name = "DA")]
    mass: f64,

    /// Half-width of the m/z integration window as a fraction of m/z [default: 0.01]
    #[arg(long)]
    window: Option<f64>,

    /// Drop rows with CCS Std.Dev. at or above this fraction of CCS [default: 0.5]
    #[arg(long, value_name = "FRACTION")]
    max_relative_stddev: Option<f64>,

    /// Charge states to include (all when omitted)
    #[arg(long = "charge", value_name = "Z")]
    charges: Vec<u32>,

    /// Output CSV
    #[arg(short, long, value_name = "CSV")]
    output: PathBuf,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Read a mapped CCS CSV
pub fn read_ccs_rows(path: &Path) -> Result<Vec<CcsRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CCS file: {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<CcsRow>, _>>()
        .with_context(|| format!("Failed to parse CCS file: {}", path.display()))
}

/// Scaler with flags taking precedence over the config file
fn scaler(args: &ScaleArgs, config: &ScalingConfig) -> ChargeStateScaler {
    let mut scaler = ChargeStateScaler::new(args.mass);
    if let Some(window) = args.window.or(config.window) {
        scaler = scaler.with_window_fraction(window);
    }
    if let Some(fraction) = args.max_relative_stddev.or(config.max_relative_stddev) {
        scaler = scaler.with_max_relative_stddev(fraction);
    }
    scaler
}

pub fn run(args: ScaleArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;

    let mut rows = read_ccs_rows(&args.ccs_csv)?;
    if !args.charges.is_empty() {
        rows.retain(|r| args.charges.contains(&r.charge));
    }
    let spectrum = read_mass_spectrum_file(&args.mass_spectrum).with_context(|| {
        format!("Failed to read mass spectrum: {}", args.mass_spectrum.display())
    })?;
    info!("Mass spectrum with {} points", spectrum.len());

    let scaler = scaler(&args, &config.scaling);
    let scaled = scaler.scale(&rows, &spectrum);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_scaled_rows(file, &scaled)?;

    let mut report = RunReport::new("Charge-State Scaling");
    report.processed = scaled.len();
    let mut charges: Vec<u32> = scaled.iter().map(|s| s.row.charge).collect();
    charges.sort_unstable();
    charges.dedup();
    for charge in charges {
        report.detail(
            format!("Scale factor z={charge}"),
            scaler.scale_factor(&spectrum, charge),
        );
    }
    report.detail("Dropped (wide CCS spread)", rows.len() - scaled.len());
    report.detail("Output", args.output.display());
    print_report(&report);

    Ok(())
}
