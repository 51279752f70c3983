//! # ccsfit
//!
//! Command-line front end for CCS calibration and Gaussian peak fitting.
//!
//! ## Usage
//!
//! ```bash
//! # Traveling-wave calibration against literature CCS values
//! ccsfit calibrate-twim calibrants/ --reference bush.csv --gas helium -o cal/
//!
//! # Tool input files for the sample ATDs
//! ccsfit prepare-inputs samples/ --mass 8565 -o inputs/
//!
//! # Collect the tool outputs, map raw ATDs and fit three conformers
//! ccsfit import-calibration tool_outputs/ -o calibrations/
//! ccsfit map samples/ --calibration calibrations/ubq.csv -o mapped/ --parquet
//! ccsfit fit mapped/ubq_ccs.csv -n 3 --summed -o fits/
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
