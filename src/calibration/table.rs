//! Calibration tables: drift time to CCS lookups per analyte and charge.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::CalibrationError;

/// One calibrated point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    /// Charge state
    #[serde(rename = "Z")]
    pub charge: u32,
    /// Drift time (s)
    #[serde(rename = "Drift")]
    pub drift_time: f64,
    /// CCS (Å²)
    #[serde(rename = "CCS")]
    pub ccs: f64,
    /// Spread of the CCS estimate (Å²); missing values read as 0
    #[serde(rename = "CCS Std.Dev.", deserialize_with = "missing_as_zero")]
    pub ccs_stddev: f64,
}

fn missing_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite()).unwrap_or(0.0))
}

impl CalibrationEntry {
    /// True when `ccs_stddev <= max_relative_stddev × ccs`
    pub fn within_spread(&self, max_relative_stddev: f64) -> bool {
        self.ccs_stddev <= max_relative_stddev * self.ccs
    }
}

/// Table key: analyte name and charge state
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CalibrationKey {
    /// Analyte name (the folder the raw files live in)
    pub analyte: String,
    /// Charge state
    pub charge: u32,
}

impl CalibrationKey {
    /// Create a key
    pub fn new(analyte: impl Into<String>, charge: u32) -> Self {
        Self {
            analyte: analyte.into(),
            charge,
        }
    }
}

/// Calibration entries grouped by analyte and charge.
///
/// Entries of one key keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    entries: BTreeMap<CalibrationKey, Vec<CalibrationEntry>>,
}

impl CalibrationTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry for `analyte`
    pub fn insert(&mut self, analyte: &str, entry: CalibrationEntry) {
        self.entries
            .entry(CalibrationKey::new(analyte, entry.charge))
            .or_default()
            .push(entry);
    }

    /// Entries for an analyte/charge pair
    pub fn entries(&self, analyte: &str, charge: u32) -> Option<&[CalibrationEntry]> {
        self.entries
            .get(&CalibrationKey::new(analyte, charge))
            .map(Vec::as_slice)
    }

    /// Entry whose drift time (s) is closest to `drift_time`; ties resolve to
    /// the earlier entry
    pub fn nearest(&self, analyte: &str, charge: u32, drift_time: f64) -> Option<&CalibrationEntry> {
        self.entries(analyte, charge)?.iter().fold(None, |best, e| match best {
            Some(b) if (b.drift_time - drift_time).abs() <= (e.drift_time - drift_time).abs() => Some(b),
            _ => Some(e),
        })
    }

    /// CCS of the entry nearest to `drift_time` (s)
    pub fn lookup_ccs(&self, analyte: &str, charge: u32, drift_time: f64) -> Option<f64> {
        self.nearest(analyte, charge, drift_time).map(|e| e.ccs)
    }

    /// Iterate over keys with their entries
    pub fn iter(&self) -> impl Iterator<Item = (&CalibrationKey, &[CalibrationEntry])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Distinct analyte names
    pub fn analytes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|k| k.analyte.as_str()).collect();
        names.dedup();
        names
    }

    /// Number of analyte/charge pairs
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// True when the table has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy keeping only entries with `ccs_stddev <= max_relative_stddev × ccs`
    pub fn filtered(&self, max_relative_stddev: f64) -> Self {
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, entries)| {
                let kept: Vec<CalibrationEntry> = entries
                    .iter()
                    .copied()
                    .filter(|e| e.within_spread(max_relative_stddev))
                    .collect();
                (!kept.is_empty()).then(|| (key.clone(), kept))
            })
            .collect();
        Self { entries }
    }

    /// Append all rows of a `Z,Drift,CCS,CCS Std.Dev.` CSV for `analyte`.
    ///
    /// Extra columns are ignored; returns the number of rows read.
    pub fn read_csv<R: Read>(&mut self, analyte: &str, reader: R) -> Result<usize, CalibrationError> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut count = 0;
        for entry in csv.deserialize::<CalibrationEntry>() {
            self.insert(analyte, entry?);
            count += 1;
        }
        Ok(count)
    }

    /// Write all entries of `analyte` as `Z,Drift,CCS,CCS Std.Dev.` CSV
    pub fn write_csv<W: Write>(&self, analyte: &str, writer: W) -> Result<usize, CalibrationError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(["Z", "Drift", "CCS", "CCS Std.Dev."])?;
        let mut count = 0;
        for (key, entries) in self.iter().filter(|(k, _)| k.analyte == analyte) {
            for entry in entries {
                csv.write_record([
                    key.charge.to_string(),
                    entry.drift_time.to_string(),
                    entry.ccs.to_string(),
                    entry.ccs_stddev.to_string(),
                ])?;
                count += 1;
            }
        }
        csv.flush()?;
        Ok(count)
    }
}
