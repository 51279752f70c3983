//! Collision-induced unfolding (CIU) extracts on a CCS axis.
//!
//! An extract is a drift time × collision voltage intensity matrix. Every
//! drift time row is assigned the CCS of the calibration entry nearest in
//! time, producing one `(CCS, drift time, voltage, intensity)` row per cell.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationEntry;
use crate::report::SkipReason;
use crate::series::{nearest_position, SeriesError};

/// Drift time × collision voltage intensity matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CiuExtract {
    drift_times: Vec<f64>,
    voltages: Vec<f64>,
    intensities: Vec<Vec<f64>>,
}

impl CiuExtract {
    /// `intensities[i][j]` is the intensity at `drift_times[i]` (ms) and `voltages[j]`
    pub fn new(
        drift_times: Vec<f64>,
        voltages: Vec<f64>,
        intensities: Vec<Vec<f64>>,
    ) -> Result<Self, SeriesError> {
        if drift_times.len() != intensities.len() {
            return Err(SeriesError::ArrayLengthMismatch {
                time_len: drift_times.len(),
                intensity_len: intensities.len(),
            });
        }
        if let Some(row) = intensities.iter().find(|r| r.len() != voltages.len()) {
            return Err(SeriesError::ArrayLengthMismatch {
                time_len: voltages.len(),
                intensity_len: row.len(),
            });
        }
        Ok(Self {
            drift_times,
            voltages,
            intensities,
        })
    }

    /// Drift times (ms)
    pub fn drift_times(&self) -> &[f64] {
        &self.drift_times
    }

    /// Collision voltages (V)
    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Intensity rows, one per drift time
    pub fn intensities(&self) -> &[Vec<f64>] {
        &self.intensities
    }
}

/// One cell of a CIU extract on the CCS axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CiuRow {
    /// CCS (Å²)
    #[serde(rename = "CCS")]
    pub ccs: f64,
    /// Drift time (ms), after injection correction
    #[serde(rename = "Drift Time")]
    pub drift_time: f64,
    /// Collision voltage (V)
    #[serde(rename = "Collision Voltage")]
    pub collision_voltage: f64,
    /// Intensity
    #[serde(rename = "Intensity")]
    pub intensity: f64,
}

/// Settings for [`map_ciu`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CiuConfig {
    /// Entries with `ccs_stddev > max_relative_stddev × ccs` are discarded
    pub max_relative_stddev: f64,
    /// Injection delay (ms) subtracted from extract drift times
    pub injection_ms: f64,
}

impl Default for CiuConfig {
    fn default() -> Self {
        Self {
            max_relative_stddev: 0.1,
            injection_ms: 0.0,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Map every cell of `extract` to CCS using one charge state's entries
pub fn map_ciu(
    extract: &CiuExtract,
    entries: &[CalibrationEntry],
    config: &CiuConfig,
) -> Result<Vec<CiuRow>, SkipReason> {
    if entries.is_empty() {
        return Err(SkipReason::NoCalibration);
    }
    let kept: Vec<&CalibrationEntry> = entries
        .iter()
        .filter(|e| e.within_spread(config.max_relative_stddev))
        .collect();
    if kept.is_empty() {
        return Err(SkipReason::AllEntriesFiltered);
    }
    let cal_ms: Vec<f64> = kept.iter().map(|e| e.drift_time * 1000.0).collect();

    let mut rows = Vec::with_capacity(extract.drift_times.len() * extract.voltages.len());
    for (drift, intensities) in extract.drift_times.iter().zip(&extract.intensities) {
        let drift = drift - config.injection_ms;
        let Some(idx) = nearest_position(&cal_ms, round_to(drift, 4)) else {
            continue;
        };
        let ccs = kept[idx].ccs;
        for (voltage, intensity) in extract.voltages.iter().zip(intensities) {
            rows.push(CiuRow {
                ccs,
                drift_time: drift,
                collision_voltage: *voltage,
                intensity: *intensity,
            });
        }
    }
    Ok(rows)
}
