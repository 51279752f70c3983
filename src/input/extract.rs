//! CIU extract CSV files.
//!
//! The first column holds drift times (ms); every other column header is a
//! collision voltage. Exports may carry two metadata lines before the header,
//! recognizable by a leading `#` on the first line.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::debug;

use super::InputError;
use crate::mapping::CiuExtract;

const METADATA_LINES: usize = 2;

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse().ok()
}

/// Read a CIU extract
pub fn read_ciu_extract<R: Read>(reader: R) -> Result<CiuExtract, InputError> {
    let mut reader = BufReader::new(reader);
    let mut first = String::new();
    reader.read_line(&mut first)?;

    let mut text = String::new();
    if first.starts_with('#') {
        let mut skipped = String::new();
        for _ in 1..METADATA_LINES {
            skipped.clear();
            reader.read_line(&mut skipped)?;
        }
    } else {
        text.push_str(&first);
    }
    reader.read_to_string(&mut text)?;

    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = csv.records();

    let header = records.next().ok_or(InputError::MissingHeader)??;
    let voltages = header
        .iter()
        .skip(1)
        .enumerate()
        .map(|(i, name)| {
            parse_cell(name).ok_or_else(|| InputError::ParseError {
                line: 1,
                message: format!("column {} header '{name}' is not a collision voltage", i + 2),
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let mut drift_times = Vec::new();
    let mut intensities = Vec::new();
    let mut dropped = 0;
    for record in records {
        let record = record?;
        let Some(drift) = record.get(0).and_then(parse_cell) else {
            dropped += 1;
            continue;
        };
        let row: Vec<f64> = (1..=voltages.len())
            .map(|j| record.get(j).and_then(parse_cell).unwrap_or(0.0))
            .collect();
        drift_times.push(drift);
        intensities.push(row);
    }
    if dropped > 0 {
        debug!("Dropped {dropped} extract row(s) without a numeric drift time");
    }

    Ok(CiuExtract::new(drift_times, voltages, intensities)?)
}

/// Read a CIU extract from a file
pub fn read_ciu_extract_file(path: impl AsRef<Path>) -> Result<CiuExtract, InputError> {
    read_ciu_extract(File::open(path)?)
}
