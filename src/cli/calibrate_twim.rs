use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use ccsfit::calibration::{
    CalibrantInput, DriftGas, InstrumentParameters, ReferenceTable, TravelingWaveCalibrator,
};
use ccsfit::input::{raw_series_files, read_arrival_series_file};
use ccsfit::report::{RunReport, SkipReason, SkippedItem};

use super::{ensure_dir, print_report, seeded_rng, single_peak_fitter, Config, InstrumentArgs};

/// File name of the serialized calibration reference
pub const REFERENCE_FILE: &str = "calibration_data.dat";
/// File name of the per-calibrant fit table
pub const FITS_FILE: &str = "calibrant_fits.csv";

#[derive(Args, Debug)]
pub struct CalibrateTwimArgs {
    /// Folder with one sub-folder of `<charge>.txt` ATDs per calibrant
    #[arg(value_name = "CALIBRANT_DIR")]
    calibrant_dir: PathBuf,

    /// Reference CSV with columns protein, mass, charge, CCS_he, CCS_n2
    #[arg(long, value_name = "CSV")]
    reference: PathBuf,

    /// Drift gas of the literature values
    #[arg(long)]
    gas: Option<DriftGas>,

    /// Wave velocity (m/s)
    #[arg(long)]
    velocity: Option<f64>,

    /// Wave height (V)
    #[arg(long)]
    wave_height: Option<f64>,

    /// Mobility cell pressure (mbar)
    #[arg(long)]
    pressure: Option<f64>,

    /// Mobility cell length (m)
    #[arg(long)]
    length: Option<f64>,

    #[command(flatten)]
    instrument: InstrumentArgs,

    /// Seed for the multi-start fits (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

pub fn run(args: CalibrateTwimArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let cal = &config.calibration;

    let gas = match args.gas {
        Some(gas) => gas,
        None => cal
            .gas
            .as_deref()
            .map(str::parse::<DriftGas>)
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("Invalid drift gas in config file")?
            .unwrap_or(DriftGas::Helium),
    };

    let defaults = InstrumentParameters::default();
    let parameters = InstrumentParameters {
        velocity: args.velocity.or(cal.velocity).unwrap_or(defaults.velocity),
        wave_height: args
            .wave_height
            .or(cal.wave_height)
            .unwrap_or(defaults.wave_height),
        pressure: args.pressure.or(cal.pressure).unwrap_or(defaults.pressure),
        length: args.length.or(cal.length).unwrap_or(defaults.length),
    };
    let instrument = args.instrument.resolve(cal);

    let reference = ReferenceTable::from_path(&args.reference).with_context(|| {
        format!("Failed to read reference database: {}", args.reference.display())
    })?;
    info!("Loaded {} reference records", reference.len());

    let files = raw_series_files(&args.calibrant_dir).with_context(|| {
        format!("Failed to scan calibrant folder: {}", args.calibrant_dir.display())
    })?;

    let mut report = RunReport::new("Traveling-Wave Calibration");
    let mut inputs = Vec::with_capacity(files.len());
    for file in files {
        match read_arrival_series_file(&file.path) {
            Ok(series) => inputs.push(CalibrantInput {
                analyte: file.analyte,
                charge: file.charge,
                series,
            }),
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                report.skipped.push(SkippedItem::new(
                    file.path.display().to_string(),
                    SkipReason::Unreadable(e.to_string()),
                ));
            }
        }
    }

    let calibrator = TravelingWaveCalibrator::new(gas)
        .with_parameters(parameters)
        .with_instrument(instrument)
        .with_fitter(single_peak_fitter(&config.fitting));
    let mut rng = seeded_rng(args.seed.or(config.fitting.seed));
    let calibration = calibrator
        .calibrate(&inputs, &reference, &mut rng)
        .context("Calibration failed")?;

    ensure_dir(&args.output)?;
    let reference_path = args.output.join(REFERENCE_FILE);
    let mut writer = BufWriter::new(
        File::create(&reference_path)
            .with_context(|| format!("Failed to create {}", reference_path.display()))?,
    );
    calibration.write_reference(&mut writer)?;
    writer.flush()?;

    let fits_path = args.output.join(FITS_FILE);
    let fits = File::create(&fits_path)
        .with_context(|| format!("Failed to create {}", fits_path.display()))?;
    calibration.write_results_csv(fits)?;

    report.processed = calibration.points.len();
    report.detail("Drift gas", gas);
    report.detail("Injection time (ms)", instrument.injection_ms());
    report.detail("Reference", reference_path.display());
    report.detail("Fits", fits_path.display());
    report.extend_skipped(calibration.skipped);
    print_report(&report);

    Ok(())
}
