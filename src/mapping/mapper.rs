//! Conversion of raw arrival time distributions to CCS spectra.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationKey, CalibrationTable};
use crate::report::{SkipReason, SkippedItem};
use crate::series::{ArrivalTimeSeries, CcsSpectrum, SeriesError};

/// Settings for [`CcsMapper`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapperConfig {
    /// Entries with `ccs_stddev > max_relative_stddev × ccs` are discarded
    pub max_relative_stddev: f64,
    /// Injection delay (ms) subtracted from raw drift times (cyclic instruments)
    pub injection_ms: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            max_relative_stddev: 0.1,
            injection_ms: 0.0,
        }
    }
}

/// One calibration entry paired with the raw intensity at its drift time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CcsRow {
    /// Charge state
    #[serde(rename = "Charge")]
    pub charge: u32,
    /// Calibrated drift time (s)
    #[serde(rename = "Drift")]
    pub drift_time: f64,
    /// CCS (Å²)
    #[serde(rename = "CCS")]
    pub ccs: f64,
    /// CCS spread (Å²)
    #[serde(rename = "CCS Std.Dev.")]
    pub ccs_stddev: f64,
    /// Raw intensity at the nearest sample
    #[serde(rename = "Intensity")]
    pub intensity: f64,
}

/// Mapped rows of one analyte charge state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedSpectrum {
    /// Analyte name
    pub analyte: String,
    /// Charge state
    pub charge: u32,
    /// One row per surviving calibration entry, in table order
    pub rows: Vec<CcsRow>,
}

impl MappedSpectrum {
    /// `(ccs, intensity)` view of the rows
    pub fn spectrum(&self) -> Result<CcsSpectrum, SeriesError> {
        CcsSpectrum::from_pairs(self.rows.iter().map(|r| (r.ccs, r.intensity)))
    }
}

/// One raw distribution awaiting mapping
#[derive(Debug, Clone)]
pub struct MappingInput {
    /// Analyte name
    pub analyte: String,
    /// Charge state
    pub charge: u32,
    /// Raw arrival time distribution (ms)
    pub series: ArrivalTimeSeries,
}

/// Result of mapping many distributions
#[derive(Debug, Clone, Default)]
pub struct MappingBatch {
    /// Successfully mapped distributions in input order
    pub spectra: Vec<MappedSpectrum>,
    /// Distributions without usable calibration
    pub skipped: Vec<SkippedItem>,
}

/// Applies a calibration table to raw arrival time distributions
#[derive(Debug, Clone)]
pub struct CcsMapper {
    table: CalibrationTable,
    known: BTreeSet<CalibrationKey>,
    config: MapperConfig,
}

impl CcsMapper {
    /// Mapper over `table`, discarding entries whose CCS spread is too large
    pub fn new(table: &CalibrationTable, config: MapperConfig) -> Self {
        let filtered = table.filtered(config.max_relative_stddev);
        let discarded = table.len() - filtered.len();
        if discarded > 0 {
            info!(
                "Discarded {discarded} of {} calibration entries with CCS Std.Dev. above {} × CCS",
                table.len(),
                config.max_relative_stddev
            );
        }
        Self {
            known: table.iter().map(|(k, _)| k.clone()).collect(),
            table: filtered,
            config,
        }
    }

    /// The filtered table used for mapping
    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    /// Current configuration
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Map one distribution.
    ///
    /// Every surviving entry of `(analyte, charge)` yields one row carrying
    /// the intensity of the raw sample nearest to the entry's drift time.
    pub fn map(
        &self,
        analyte: &str,
        charge: u32,
        series: &ArrivalTimeSeries,
    ) -> Result<MappedSpectrum, SkippedItem> {
        let label = format!("{analyte}_{charge}");
        let Some(entries) = self.table.entries(analyte, charge) else {
            let reason = if self.known.contains(&CalibrationKey::new(analyte, charge)) {
                SkipReason::AllEntriesFiltered
            } else {
                SkipReason::NoCalibration
            };
            return Err(SkippedItem::new(label, reason));
        };

        let shifted;
        let series = if self.config.injection_ms != 0.0 {
            shifted = series
                .subtract_injection_time(self.config.injection_ms)
                .map_err(|_| {
                    SkippedItem::new(
                        label.clone(),
                        SkipReason::OutOfRange("no samples after injection time".into()),
                    )
                })?;
            &shifted
        } else {
            series
        };
        let intensity = series.intensity();

        // Table drift times are in seconds, raw drift times in milliseconds
        let rows: Vec<CcsRow> = entries
            .iter()
            .map(|entry| CcsRow {
                charge,
                drift_time: entry.drift_time,
                ccs: entry.ccs,
                ccs_stddev: entry.ccs_stddev,
                intensity: intensity[series.nearest_index(entry.drift_time * 1000.0)],
            })
            .collect();
        debug!("{label}: mapped {} rows", rows.len());

        Ok(MappedSpectrum {
            analyte: analyte.to_string(),
            charge,
            rows,
        })
    }

    /// Map many distributions, collecting the ones without calibration
    pub fn map_all(&self, inputs: &[MappingInput]) -> MappingBatch {
        let mut batch = MappingBatch::default();
        for input in inputs {
            match self.map(&input.analyte, input.charge, &input.series) {
                Ok(mapped) => batch.spectra.push(mapped),
                Err(item) => {
                    warn!("Skipping {item}");
                    batch.skipped.push(item);
                }
            }
        }
        info!(
            "Mapped {} distribution(s), skipped {}",
            batch.spectra.len(),
            batch.skipped.len()
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationEntry;

    fn entry(charge: u32, drift_time: f64, ccs: f64, ccs_stddev: f64) -> CalibrationEntry {
        CalibrationEntry {
            charge,
            drift_time,
            ccs,
            ccs_stddev,
        }
    }

    #[test]
    fn test_single_entry_scenario() {
        let mut table = CalibrationTable::new();
        table.insert("myo", entry(5, 0.002, 500.0, 10.0));
        let series =
            ArrivalTimeSeries::new(vec![1.0, 2.0, 3.0], vec![7.0, 42.0, 9.0]).unwrap();

        let mapped = CcsMapper::new(&table, MapperConfig::default())
            .map("myo", 5, &series)
            .unwrap();
        assert_eq!(
            mapped.rows,
            vec![CcsRow {
                charge: 5,
                drift_time: 0.002,
                ccs: 500.0,
                ccs_stddev: 10.0,
                intensity: 42.0,
            }]
        );
    }

    #[test]
    fn test_one_row_per_surviving_entry() {
        let mut table = CalibrationTable::new();
        for i in 0..6 {
            let stddev = if i % 2 == 0 { 1.0 } else { 100.0 };
            table.insert("a", entry(4, 0.001 * (i + 1) as f64, 500.0, stddev));
        }
        let series = ArrivalTimeSeries::new(vec![1.0, 3.0, 5.0], vec![1.0, 2.0, 3.0]).unwrap();
        let mapped = CcsMapper::new(&table, MapperConfig::default())
            .map("a", 4, &series)
            .unwrap();
        assert_eq!(mapped.rows.len(), 3);
    }

    #[test]
    fn test_skip_reasons() {
        let mut table = CalibrationTable::new();
        table.insert("a", entry(4, 0.001, 500.0, 400.0));
        let mapper = CcsMapper::new(&table, MapperConfig::default());
        let series = ArrivalTimeSeries::new(vec![1.0, 2.0], vec![1.0, 2.0]).unwrap();

        assert_eq!(
            mapper.map("a", 4, &series).unwrap_err().reason,
            SkipReason::AllEntriesFiltered
        );
        assert_eq!(
            mapper.map("b", 4, &series).unwrap_err().reason,
            SkipReason::NoCalibration
        );
    }

    #[test]
    fn test_injection_time_shifts_matching() {
        let mut table = CalibrationTable::new();
        table.insert("a", entry(3, 0.001, 300.0, 0.0));
        let series = ArrivalTimeSeries::new(vec![1.0, 3.0], vec![10.0, 30.0]).unwrap();
        let config = MapperConfig {
            injection_ms: 2.0,
            ..Default::default()
        };
        let mapped = CcsMapper::new(&table, config).map("a", 3, &series).unwrap();
        // 3.0 ms - 2.0 ms = 1.0 ms; the 1.0 ms sample is dropped
        assert_eq!(mapped.rows[0].intensity, 30.0);
    }

    #[test]
    fn test_injection_time_beyond_series_is_skipped() {
        let mut table = CalibrationTable::new();
        table.insert("a", entry(3, 0.001, 300.0, 0.0));
        let series = ArrivalTimeSeries::new(vec![1.0, 3.0], vec![10.0, 30.0]).unwrap();
        let config = MapperConfig {
            injection_ms: 5.0,
            ..Default::default()
        };
        let item = CcsMapper::new(&table, config).map("a", 3, &series).unwrap_err();
        assert_eq!(item.label, "a_3");
        assert!(matches!(item.reason, SkipReason::OutOfRange(_)));
    }

    #[test]
    fn test_nearest_sample_tie_takes_earlier() {
        let mut table = CalibrationTable::new();
        table.insert("a", entry(2, 0.0015, 300.0, 0.0));
        let series = ArrivalTimeSeries::new(vec![1.0, 2.0], vec![10.0, 20.0]).unwrap();
        let mapped = CcsMapper::new(&table, MapperConfig::default())
            .map("a", 2, &series)
            .unwrap();
        assert_eq!(mapped.rows[0].intensity, 10.0);
    }

    #[test]
    fn test_map_all_collects_skipped() {
        let mut table = CalibrationTable::new();
        table.insert("a", entry(3, 0.001, 300.0, 0.0));
        let series = ArrivalTimeSeries::new(vec![1.0, 3.0], vec![10.0, 30.0]).unwrap();
        let inputs = vec![
            MappingInput {
                analyte: "a".into(),
                charge: 3,
                series: series.clone(),
            },
            MappingInput {
                analyte: "a".into(),
                charge: 9,
                series,
            },
        ];
        let batch = CcsMapper::new(&table, MapperConfig::default()).map_all(&inputs);
        assert_eq!(batch.spectra.len(), 1);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].label, "a_9");
    }
}
