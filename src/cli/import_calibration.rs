use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::fs::File;
use std::path::PathBuf;

use ccsfit::calibration::imscal::{import_output, output_file_charge};
use ccsfit::calibration::CalibrationTable;
use ccsfit::input::analyte_files;
use ccsfit::report::{RunReport, SkipReason, SkippedItem};

use super::{ensure_dir, print_report, Config};

#[derive(Args, Debug)]
pub struct ImportCalibrationArgs {
    /// Folder with one sub-folder of `output_<charge>.dat` files per analyte
    #[arg(value_name = "TOOL_OUTPUT_DIR")]
    tool_output_dir: PathBuf,

    /// Output directory; one `<analyte>.csv` is written per analyte
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

pub fn run(args: ImportCalibrationArgs) -> Result<()> {
    // Only validates the file; import has no tunable settings
    Config::load(args.config.as_deref())?;

    let files = analyte_files(&args.tool_output_dir, output_file_charge).with_context(|| {
        format!("Failed to scan tool output folder: {}", args.tool_output_dir.display())
    })?;

    let mut report = RunReport::new("Calibration Import");
    let mut table = CalibrationTable::new();
    for file in &files {
        let imported = File::open(&file.path)
            .map_err(Into::into)
            .and_then(|f| import_output(&mut table, &file.analyte, f));
        match imported {
            Ok(count) => info!("{}: {count} calibrated points", file.path.display()),
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                report.skipped.push(SkippedItem::new(
                    file.path.display().to_string(),
                    SkipReason::Unreadable(e.to_string()),
                ));
            }
        }
    }

    if table.is_empty() {
        anyhow::bail!(
            "No calibrated data found in {}",
            args.tool_output_dir.display()
        );
    }

    ensure_dir(&args.output)?;
    for analyte in table.analytes() {
        let path = args.output.join(format!("{analyte}.csv"));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let rows = table.write_csv(analyte, file)?;
        info!("Wrote {rows} rows to {}", path.display());
        report.processed += 1;
    }

    report.detail("Entries", table.len());
    report.detail("Charge states", table.key_count());
    print_report(&report);

    Ok(())
}
