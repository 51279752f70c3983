use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use ccsfit::calibration::CalibrationTable;
use ccsfit::export::{write_ccs_rows, RunMetadata, SpectrumWriter, SpectrumWriterConfig};
use ccsfit::input::{raw_series_files, read_arrival_series_file};
use ccsfit::mapping::{CcsMapper, CcsRow, MapperConfig, MappingInput};
use ccsfit::report::{RunReport, SkipReason, SkippedItem};

use super::{ensure_dir, print_report, Config, InstrumentArgs};

/// File name of the Parquet spectrum store
pub const PARQUET_FILE: &str = "ccs_spectra.parquet";

#[derive(Args, Debug)]
pub struct MapArgs {
    /// Folder with one sub-folder of `<charge>.txt` ATDs per analyte
    #[arg(value_name = "RAW_DIR")]
    raw_dir: PathBuf,

    /// Calibration CSVs; the file stem names the analyte
    #[arg(long, value_name = "CSV", num_args = 1.., required = true)]
    calibration: Vec<PathBuf>,

    /// Discard calibration entries with CCS Std.Dev. above this fraction of CCS
    #[arg(long, value_name = "F")]
    max_relative_stddev: Option<f64>,

    #[command(flatten)]
    instrument: InstrumentArgs,

    /// Output directory; one `<analyte>_ccs.csv` is written per analyte
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Also write all spectra to a Parquet file
    #[arg(long)]
    parquet: bool,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Analyte name of a calibration CSV
fn analyte_of(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("Calibration file has no name: {}", path.display()))
}

/// Read all calibration CSVs into one table
pub fn load_calibration(paths: &[PathBuf]) -> Result<CalibrationTable> {
    let mut table = CalibrationTable::new();
    for path in paths {
        let analyte = analyte_of(path)?;
        let file = File::open(path)
            .with_context(|| format!("Failed to open calibration file: {}", path.display()))?;
        let count = table
            .read_csv(&analyte, file)
            .with_context(|| format!("Failed to read calibration file: {}", path.display()))?;
        info!("{analyte}: {count} calibration entries");
    }
    if table.is_empty() {
        anyhow::bail!("Calibration files contain no entries");
    }
    Ok(table)
}

pub fn run(args: MapArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let mapper_config = MapperConfig {
        max_relative_stddev: args
            .max_relative_stddev
            .or(config.mapping.max_relative_stddev)
            .unwrap_or(MapperConfig::default().max_relative_stddev),
        injection_ms: args.instrument.resolve(&config.calibration).injection_ms(),
    };

    let table = load_calibration(&args.calibration)?;
    let mapper = CcsMapper::new(&table, mapper_config);
    if mapper.table().is_empty() {
        anyhow::bail!(
            "No calibration entries left after the CCS Std.Dev. filter ({})",
            mapper_config.max_relative_stddev
        );
    }

    let files = raw_series_files(&args.raw_dir)
        .with_context(|| format!("Failed to scan raw folder: {}", args.raw_dir.display()))?;
    let mut unreadable = Vec::new();
    let mut inputs = Vec::with_capacity(files.len());
    for file in files {
        match read_arrival_series_file(&file.path) {
            Ok(series) => inputs.push(MappingInput {
                analyte: file.analyte,
                charge: file.charge,
                series,
            }),
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                unreadable.push(SkippedItem::new(
                    file.path.display().to_string(),
                    SkipReason::Unreadable(e.to_string()),
                ));
            }
        }
    }

    let batch = mapper.map_all(&inputs);

    ensure_dir(&args.output)?;
    let mut by_analyte: BTreeMap<&str, Vec<CcsRow>> = BTreeMap::new();
    for spectrum in &batch.spectra {
        by_analyte
            .entry(spectrum.analyte.as_str())
            .or_default()
            .extend_from_slice(&spectrum.rows);
    }
    for (analyte, rows) in &by_analyte {
        let path = args.output.join(format!("{analyte}_ccs.csv"));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_ccs_rows(file, rows)?;
        info!("Wrote {} rows to {}", rows.len(), path.display());
    }

    let mut report = RunReport::new("CCS Mapping");
    if args.parquet || config.mapping.parquet.unwrap_or(false) {
        let path = args.output.join(PARQUET_FILE);
        let metadata = RunMetadata::new(mapper_config.max_relative_stddev, mapper_config.injection_ms)
            .with_calibration_files(
                args.calibration
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            );
        let mut writer = SpectrumWriter::new_file(&path, &metadata, SpectrumWriterConfig::default())
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_spectra(&batch.spectra)?;
        let stats = writer.finish()?;
        info!("{stats}");
        report.detail("Parquet", path.display());
    }

    report.processed = batch.spectra.len();
    report.detail("Analytes", by_analyte.len());
    report.detail("Max relative CCS Std.Dev.", mapper_config.max_relative_stddev);
    report.extend_skipped(unreadable);
    report.extend_skipped(batch.skipped.iter().cloned());
    print_report(&report);

    Ok(())
}
