//! Literature CCS values for calibrant ions.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CalibrationError;

/// Buffer gas of the mobility cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftGas {
    /// He
    Helium,
    /// N₂
    Nitrogen,
}

impl DriftGas {
    /// Molecular mass in Da
    pub fn mass_da(self) -> f64 {
        match self {
            DriftGas::Helium => 4.002602,
            DriftGas::Nitrogen => 28.0134,
        }
    }
}

impl fmt::Display for DriftGas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftGas::Helium => write!(f, "helium"),
            DriftGas::Nitrogen => write!(f, "nitrogen"),
        }
    }
}

impl FromStr for DriftGas {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "he" | "helium" => Ok(DriftGas::Helium),
            "n2" | "nitrogen" => Ok(DriftGas::Nitrogen),
            other => Err(format!("unknown drift gas '{other}'")),
        }
    }
}

/// One calibrant ion in the reference database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Analyte name as used for folder names
    #[serde(rename = "protein")]
    pub analyte: String,
    /// Mass in Da
    pub mass: f64,
    /// Charge state
    pub charge: u32,
    /// Helium CCS in nm²
    #[serde(rename = "CCS_he")]
    pub ccs_he: Option<f64>,
    /// Nitrogen CCS in nm²
    #[serde(rename = "CCS_n2")]
    pub ccs_n2: Option<f64>,
}

impl ReferenceRecord {
    /// Literature CCS for `gas`, if measured
    pub fn ccs(&self, gas: DriftGas) -> Option<f64> {
        match gas {
            DriftGas::Helium => self.ccs_he,
            DriftGas::Nitrogen => self.ccs_n2,
        }
    }
}

/// Source of literature CCS values keyed by analyte and charge
pub trait CcsReference {
    /// Reference record for an analyte/charge pair
    fn record(&self, analyte: &str, charge: u32) -> Option<&ReferenceRecord>;
}

/// In-memory reference table, usually loaded from CSV with columns
/// `protein, mass, charge, CCS_he, CCS_n2`
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    records: BTreeMap<(String, u32), ReferenceRecord>,
}

impl ReferenceTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record
    pub fn insert(&mut self, record: ReferenceRecord) {
        self.records
            .insert((record.analyte.clone(), record.charge), record);
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parse CSV from a reader; empty CCS cells mean "not measured"
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CalibrationError> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut table = Self::new();
        for record in csv.deserialize() {
            table.insert(record?);
        }
        Ok(table)
    }

    /// Load a CSV file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }
}

impl CcsReference for ReferenceTable {
    fn record(&self, analyte: &str, charge: u32) -> Option<&ReferenceRecord> {
        self.records.get(&(analyte.to_string(), charge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "protein,mass,charge,CCS_he,CCS_n2\n\
                       ubiquitin,8565,6,15.1,\n\
                       cytochromec,12359,7,15.8,25.2\n";

    #[test]
    fn test_parse_reference_csv() {
        let table = ReferenceTable::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let ubq = table.record("ubiquitin", 6).unwrap();
        assert_eq!(ubq.mass, 8565.0);
        assert_eq!(ubq.ccs(DriftGas::Helium), Some(15.1));
        assert_eq!(ubq.ccs(DriftGas::Nitrogen), None);
        assert!(table.record("ubiquitin", 7).is_none());
    }

    #[test]
    fn test_missing_column_is_error() {
        let result = ReferenceTable::from_reader("protein,mass\nubiquitin,8565\n".as_bytes());
        assert!(matches!(result, Err(CalibrationError::CsvError(_))));
    }

    #[test]
    fn test_drift_gas_parsing() {
        assert_eq!("He".parse::<DriftGas>(), Ok(DriftGas::Helium));
        assert_eq!("nitrogen".parse::<DriftGas>(), Ok(DriftGas::Nitrogen));
        assert!("argon".parse::<DriftGas>().is_err());
    }
}
