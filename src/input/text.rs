//! Whitespace-separated numeric tables.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use super::InputError;
use crate::mapping::MassSpectrum;
use crate::series::ArrivalTimeSeries;

/// Read the first two numeric columns of a whitespace or tab separated table.
///
/// Blank lines and lines starting with `#` are ignored; extra columns are
/// ignored.
pub fn read_two_columns<R: Read>(reader: R) -> Result<Vec<(f64, f64)>, InputError> {
    let mut pairs = Vec::new();
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let mut next = |name: &str| -> Result<f64, InputError> {
            let field = fields.next().ok_or_else(|| InputError::ParseError {
                line: index + 1,
                message: format!("missing {name} column"),
            })?;
            field.parse().map_err(|_| InputError::ParseError {
                line: index + 1,
                message: format!("invalid {name} value '{field}'"),
            })
        };
        let first = next("first")?;
        let second = next("second")?;
        pairs.push((first, second));
    }
    Ok(pairs)
}

/// Read an arrival time distribution (`drift_ms intensity` per line)
pub fn read_arrival_series<R: Read>(reader: R) -> Result<ArrivalTimeSeries, InputError> {
    Ok(ArrivalTimeSeries::from_pairs(read_two_columns(reader)?)?)
}

/// Read an arrival time distribution from a file
pub fn read_arrival_series_file(path: impl AsRef<Path>) -> Result<ArrivalTimeSeries, InputError> {
    read_arrival_series(File::open(path)?)
}

/// Read a mass spectrum (`m/z intensity` per line) from a file
pub fn read_mass_spectrum_file(path: impl AsRef<Path>) -> Result<MassSpectrum, InputError> {
    let (mz, intensity) = read_two_columns(File::open(path)?)?.into_iter().unzip();
    Ok(MassSpectrum::new(mz, intensity)?)
}
