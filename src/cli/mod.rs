use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use ccsfit::calibration::InstrumentKind;
use ccsfit::fitting::{
    FitConfig, MultiGaussianConfig, MultiGaussianFitter, SinglePeakConfig, SinglePeakFitter,
};
use ccsfit::report::RunReport;

mod calibrate_drift_tube;
mod calibrate_twim;
mod ciu;
mod config;
mod fit;
mod import_calibration;
mod map;
mod prepare_inputs;
mod scale;

pub use config::{CalibrationConfig, Config, FittingConfig, ScalingConfig};

/// Injection time assumed for cyclic instruments when none is given (ms)
pub const DEFAULT_INJECT_TIME_MS: f64 = 12.0;

/// ccsfit - CCS calibration and Gaussian peak fitting for ion mobility data
#[derive(Parser)]
#[command(name = "ccsfit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit calibrant ATDs and write the reference for the CCS calculation tool
    CalibrateTwim(calibrate_twim::CalibrateTwimArgs),

    /// Calibrate linear drift-tube data and convert every sample to CCS
    CalibrateDriftTube(calibrate_drift_tube::CalibrateDriftTubeArgs),

    /// Write the CCS calculation tool's input files for sample ATDs
    PrepareInputs(prepare_inputs::PrepareInputsArgs),

    /// Collect the CCS calculation tool's outputs into calibration CSVs
    ImportCalibration(import_calibration::ImportCalibrationArgs),

    /// Map raw ATDs onto CCS using calibration CSVs
    Map(map::MapArgs),

    /// Normalize and scale charge states by mass spectrum abundance
    Scale(scale::ScaleArgs),

    /// Map a CIU extract onto CCS
    Ciu(ciu::CiuArgs),

    /// Fit Gaussian components to mapped CCS spectra
    Fit(fit::FitArgs),
}

/// Instrument family flags shared by commands that correct drift times
#[derive(Args, Debug, Clone, Default)]
pub struct InstrumentArgs {
    /// Data was recorded on a cyclic instrument
    #[arg(long)]
    pub cyclic: bool,

    /// Injection time to subtract (ms); implies --cyclic
    #[arg(long, value_name = "MS")]
    pub inject_time: Option<f64>,
}

impl InstrumentArgs {
    /// Combine flags with the config file; flags win
    pub fn resolve(&self, config: &CalibrationConfig) -> InstrumentKind {
        let cyclic =
            self.cyclic || self.inject_time.is_some() || config.cyclic.unwrap_or(false);
        if !cyclic {
            return InstrumentKind::Synapt;
        }
        InstrumentKind::Cyclic {
            injection_ms: self
                .inject_time
                .or(config.inject_time_ms)
                .unwrap_or(DEFAULT_INJECT_TIME_MS),
        }
    }
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::CalibrateTwim(args) => calibrate_twim::run(args),
        Commands::CalibrateDriftTube(args) => calibrate_drift_tube::run(args),
        Commands::PrepareInputs(args) => prepare_inputs::run(args),
        Commands::ImportCalibration(args) => import_calibration::run(args),
        Commands::Map(args) => map::run(args),
        Commands::Scale(args) => scale::run(args),
        Commands::Ciu(args) => ciu::run(args),
        Commands::Fit(args) => fit::run(args),
    }
}

fn solver_config(fitting: &FittingConfig, mut solver: FitConfig) -> FitConfig {
    if let Some(max_iter) = fitting.max_iter {
        solver = solver.max_iter(max_iter);
    }
    if let Some(tolerance) = fitting.tolerance {
        solver = solver.tolerance(tolerance);
    }
    solver
}

/// Single-peak fitter with config file overrides
pub fn single_peak_fitter(fitting: &FittingConfig) -> SinglePeakFitter {
    let defaults = SinglePeakConfig::default();
    SinglePeakFitter::new(SinglePeakConfig {
        attempts: fitting.attempts.unwrap_or(defaults.attempts),
        solver: solver_config(fitting, defaults.solver),
    })
}

/// Composite fitter with config file overrides
pub fn multi_gaussian_fitter(fitting: &FittingConfig) -> MultiGaussianFitter {
    let defaults = MultiGaussianConfig::default();
    MultiGaussianFitter::new(MultiGaussianConfig {
        solver: solver_config(fitting, defaults.solver),
        smoothing_sigma: fitting.smoothing_sigma.unwrap_or(defaults.smoothing_sigma),
    })
}

/// Seeded generator when a seed is given, otherwise seeded from the OS
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Create `dir` and its parents
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}

/// Print a run summary to stdout
pub fn print_report(report: &RunReport) {
    println!();
    print!("{}", report.format_colored());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_resolution() {
        let config = CalibrationConfig::default();
        assert_eq!(
            InstrumentArgs::default().resolve(&config),
            InstrumentKind::Synapt
        );

        let cyclic = InstrumentArgs {
            cyclic: true,
            inject_time: None,
        };
        assert_eq!(
            cyclic.resolve(&config),
            InstrumentKind::Cyclic {
                injection_ms: DEFAULT_INJECT_TIME_MS
            }
        );

        let from_file = CalibrationConfig {
            cyclic: Some(true),
            inject_time_ms: Some(8.0),
            ..Default::default()
        };
        let flag = InstrumentArgs {
            cyclic: false,
            inject_time: Some(5.0),
        };
        assert_eq!(
            flag.resolve(&from_file),
            InstrumentKind::Cyclic { injection_ms: 5.0 }
        );
        assert_eq!(
            InstrumentArgs::default().resolve(&from_file),
            InstrumentKind::Cyclic { injection_ms: 8.0 }
        );
    }

    #[test]
    fn test_fitter_overrides() {
        let fitting = FittingConfig {
            attempts: Some(3),
            max_iter: Some(50),
            ..Default::default()
        };
        let fitter = single_peak_fitter(&fitting);
        assert_eq!(fitter.config().attempts, 3);
        assert_eq!(fitter.config().solver.iteration_limit(), 50);

        let composite = multi_gaussian_fitter(&FittingConfig::default());
        assert_eq!(composite.config().solver.iteration_limit(), 10_000);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "ccsfit", "-vv", "fit", "spectra.csv", "-n", "3", "--charge", "7", "--fix", "c2=1500",
            "-o", "out",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), 2);
        assert!(matches!(cli.command, Commands::Fit(_)));
    }
}
