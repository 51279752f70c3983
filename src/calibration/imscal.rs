//! Exchange files of the external CCS calculation tool.
//!
//! The tool reads one `input_<charge>.dat` per analyte charge state and
//! writes one `output_<charge>.dat` whose `[CALIBRATED DATA]` section is a
//! CSV table with at least `Z, Drift, CCS, CCS Std.Dev.`.

use std::io::{BufRead, BufReader, Read, Write};

use super::table::{CalibrationEntry, CalibrationTable};
use super::CalibrationError;
use crate::series::ArrivalTimeSeries;

/// Marker line that starts the calibrated section of a tool output file
pub const CALIBRATED_DATA_MARKER: &str = "[CALIBRATED DATA]";

/// Parse the calibrated section of one tool output file
pub fn parse_output<R: Read>(reader: R) -> Result<Vec<CalibrationEntry>, CalibrationError> {
    let mut lines = BufReader::new(reader).lines();
    let mut found = false;
    for line in lines.by_ref() {
        if line?.trim() == CALIBRATED_DATA_MARKER {
            found = true;
            break;
        }
    }
    if !found {
        return Err(CalibrationError::MissingCalibratedData);
    }

    let mut section = String::new();
    for line in lines {
        section.push_str(&line?);
        section.push('\n');
    }

    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(section.as_bytes());
    let mut entries = Vec::new();
    for entry in csv.deserialize::<CalibrationEntry>() {
        entries.push(entry?);
    }
    Ok(entries)
}

/// Parse a tool output file and add its entries to `table` under `analyte`
pub fn import_output<R: Read>(
    table: &mut CalibrationTable,
    analyte: &str,
    reader: R,
) -> Result<usize, CalibrationError> {
    let entries = parse_output(reader)?;
    let count = entries.len();
    for entry in entries {
        table.insert(analyte, entry);
    }
    Ok(count)
}

/// Write a tool input file: `index mass charge intensity drift_time` per sample.
///
/// The injection delay is subtracted and drift times are clamped at 0.
pub fn write_input<W: Write>(
    mut writer: W,
    series: &ArrivalTimeSeries,
    mass: f64,
    charge: u32,
    injection_ms: f64,
) -> std::io::Result<()> {
    for (index, (t, intensity)) in series.iter().enumerate() {
        let drift = (t - injection_ms).max(0.0);
        writeln!(writer, "{index} {mass} {charge} {intensity} {drift}")?;
    }
    Ok(())
}

/// File name of the tool input for `charge`
pub fn input_file_name(charge: u32) -> String {
    format!("input_{charge}.dat")
}

/// Charge state encoded in an `output_<charge>.dat` file name
pub fn output_file_charge(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("output_")?
        .strip_suffix(".dat")?
        .parse()
        .ok()
}
