use anyhow::{Context, Result};
use clap::Args;
use log::{debug, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use ccsfit::calibration::imscal::{input_file_name, write_input};
use ccsfit::input::{raw_series_files, read_arrival_series_file};
use ccsfit::report::{RunReport, SkipReason, SkippedItem};

use super::{ensure_dir, print_report, Config, InstrumentArgs};

#[derive(Args, Debug)]
pub struct PrepareInputsArgs {
    /// Folder with one sub-folder of `<charge>.txt` ATDs per sample
    #[arg(value_name = "SAMPLE_DIR")]
    sample_dir: PathBuf,

    /// Molecular mass of the sample (Da)
    #[arg(long, value_name = "DA")]
    mass: f64,

    #[command(flatten)]
    instrument: InstrumentArgs,

    /// Output directory; one sub-folder per sample is created
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

pub fn run(args: PrepareInputsArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let injection_ms = args.instrument.resolve(&config.calibration).injection_ms();

    let files = raw_series_files(&args.sample_dir).with_context(|| {
        format!("Failed to scan sample folder: {}", args.sample_dir.display())
    })?;

    let mut report = RunReport::new("Tool Input Files");
    for file in files {
        let series = match read_arrival_series_file(&file.path) {
            Ok(series) => series,
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                report.skipped.push(SkippedItem::new(
                    file.path.display().to_string(),
                    SkipReason::Unreadable(e.to_string()),
                ));
                continue;
            }
        };

        let folder = args.output.join(&file.analyte);
        ensure_dir(&folder)?;
        let path = folder.join(input_file_name(file.charge));
        let mut writer = BufWriter::new(
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?,
        );
        write_input(&mut writer, &series, args.mass, file.charge, injection_ms)?;
        writer.flush()?;
        debug!("Wrote {}", path.display());
        report.processed += 1;
    }

    report.detail("Mass (Da)", args.mass);
    report.detail("Injection time (ms)", injection_ms);
    report.detail("Output", args.output.display());
    print_report(&report);

    Ok(())
}
