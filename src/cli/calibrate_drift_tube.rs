//! Linear drift-tube calibration driven by a TOML run description:
//!
//! ```toml
//! gas = "helium"
//! pressure_pa = 230.0
//! temperature_k = 298.15
//! length_m = 0.254
//! mass_da = 8565.0
//! charge = 6
//!
//! [[runs]]
//! file = "atd_100V.txt"    # relative to this file
//! cell_dc = 150.0
//! bias = 45.0
//! transfer_dc_entrance = 80.0
//! exit_dc = 15.0
//! ```

use anyhow::{Context, Result};
use clap::Args;
use log::info;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use ccsfit::calibration::{
    AnalyteIon, CellConditions, DriftGas, DriftTubeCalibrator, DriftTubeRun, VoltageSettings,
};
use ccsfit::export::write_drift_tube_table;
use ccsfit::input::read_arrival_series_file;
use ccsfit::report::RunReport;

use super::{ensure_dir, print_report, Config};

/// File name of the calibration summary
pub const SUMMARY_FILE: &str = "drift_tube_calibration.json";

#[derive(Args, Debug)]
pub struct CalibrateDriftTubeArgs {
    /// TOML file describing cell conditions, the ion and one entry per run
    #[arg(value_name = "RUNS_TOML")]
    runs: PathBuf,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Run description file
#[derive(Debug, Deserialize)]
pub struct DriftTubeSetup {
    /// Buffer gas; falls back to `[calibration] gas`, then helium
    pub gas: Option<DriftGas>,
    /// Buffer gas pressure (Pa)
    pub pressure_pa: f64,
    /// Buffer gas temperature (K)
    pub temperature_k: f64,
    /// Drift region length (m)
    pub length_m: f64,
    /// Analyte mass (Da)
    pub mass_da: f64,
    /// Analyte charge
    pub charge: u32,
    /// One acquisition per drift voltage
    #[serde(default)]
    pub runs: Vec<RunSetup>,
}

/// One acquisition in the run description
#[derive(Debug, Deserialize)]
pub struct RunSetup {
    /// Two-column ATD file
    pub file: PathBuf,
    /// Drift cell DC (V)
    pub cell_dc: f64,
    /// Bias (V)
    pub bias: f64,
    /// Transfer DC entrance (V)
    pub transfer_dc_entrance: f64,
    /// Exit DC (V)
    pub exit_dc: f64,
}

impl DriftTubeSetup {
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse drift-tube run description")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run description: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Read every run's ATD, resolving paths against `base`
    fn load_runs(&self, base: &Path) -> Result<Vec<DriftTubeRun>> {
        self.runs
            .iter()
            .map(|run| {
                let path = base.join(&run.file);
                let series = read_arrival_series_file(&path)
                    .with_context(|| format!("Failed to read ATD: {}", path.display()))?;
                let label = run
                    .file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| run.file.display().to_string());
                Ok(DriftTubeRun {
                    label,
                    voltages: VoltageSettings {
                        cell_dc: run.cell_dc,
                        bias: run.bias,
                        transfer_dc_entrance: run.transfer_dc_entrance,
                        exit_dc: run.exit_dc,
                    },
                    series,
                })
            })
            .collect()
    }
}

pub fn run(args: CalibrateDriftTubeArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let setup = DriftTubeSetup::from_file(&args.runs)?;

    let gas = match setup.gas {
        Some(gas) => gas,
        None => config
            .calibration
            .gas
            .as_deref()
            .map(str::parse::<DriftGas>)
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("Invalid drift gas in config file")?
            .unwrap_or(DriftGas::Helium),
    };
    let conditions = CellConditions::new(gas, setup.pressure_pa, setup.temperature_k, setup.length_m);
    let ion = AnalyteIon {
        mass_da: setup.mass_da,
        charge: setup.charge,
    };

    let base = args.runs.parent().unwrap_or_else(|| Path::new("."));
    let runs = setup.load_runs(base)?;
    info!("Loaded {} drift-tube run(s)", runs.len());

    let calibration = DriftTubeCalibrator::new(conditions, ion)
        .calibrate(&runs)
        .context("Drift-tube calibration failed")?;
    let (tables, skipped) = calibration.ccs_tables(&runs);

    ensure_dir(&args.output)?;
    for table in &tables {
        let path = args.output.join(format!("{}_ccs.csv", table.label));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let rows = write_drift_tube_table(file, table)?;
        info!("Wrote {rows} rows to {}", path.display());
    }

    let summary_path = args.output.join(SUMMARY_FILE);
    let summary = File::create(&summary_path)
        .with_context(|| format!("Failed to create {}", summary_path.display()))?;
    serde_json::to_writer_pretty(summary, &calibration)
        .context("Failed to write calibration summary")?;

    let mut report = RunReport::new("Drift-Tube Calibration");
    report.processed = tables.len();
    report.detail("t0 (ms)", format!("{:.6}", calibration.t0));
    report.detail("td (ms·V)", format!("{:.6}", calibration.td));
    report.detail("R²", format!("{:.6}", calibration.r_squared));
    report.detail("Summary", summary_path.display());
    report.extend_skipped(skipped);
    print_report(&report);

    Ok(())
}
