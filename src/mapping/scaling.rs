//! Relative scaling of charge-state CCS distributions.
//!
//! Each charge state's intensities are normalized to their own maximum and
//! multiplied by the charge state's abundance in the native mass spectrum,
//! integrated over a ±1% window around its m/z.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::mapper::CcsRow;
use crate::series::SeriesError;

/// Proton mass (Da)
pub const PROTON_MASS: f64 = 1.007276;

/// m/z of `[M + zH]^z+`
pub fn charge_state_mz(mass: f64, charge: u32) -> f64 {
    let z = charge as f64;
    (mass + z * PROTON_MASS) / z
}

/// Centroid or profile mass spectrum
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MassSpectrum {
    mz: Vec<f64>,
    intensity: Vec<f64>,
}

impl MassSpectrum {
    /// Create from parallel arrays
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Result<Self, SeriesError> {
        if mz.len() != intensity.len() {
            return Err(SeriesError::ArrayLengthMismatch {
                time_len: mz.len(),
                intensity_len: intensity.len(),
            });
        }
        Ok(Self { mz, intensity })
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.mz.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// Summed intensity with `lo <= m/z <= hi`
    pub fn window_sum(&self, lo: f64, hi: f64) -> f64 {
        self.mz
            .iter()
            .zip(&self.intensity)
            .filter(|(mz, _)| **mz >= lo && **mz <= hi)
            .map(|(_, i)| i)
            .sum()
    }
}

/// A mapped row with its scaling columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledRow {
    /// Original mapped row
    #[serde(flatten)]
    pub row: CcsRow,
    /// Integrated mass-spectrum abundance of the charge state
    #[serde(rename = "Scale Factor")]
    pub scale_factor: f64,
    /// Intensity divided by the charge state's maximum
    #[serde(rename = "Normalized Intensity")]
    pub normalized: f64,
    /// `normalized × scale_factor`
    #[serde(rename = "Scaled Intensity")]
    pub scaled: f64,
}

/// Settings and analyte mass for [`ChargeStateScaler`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeStateScaler {
    mass: f64,
    window_fraction: f64,
    max_relative_stddev: f64,
}

impl ChargeStateScaler {
    /// Scaler for an analyte of neutral `mass` (Da), ±1% windows
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            window_fraction: 0.01,
            max_relative_stddev: 0.5,
        }
    }

    /// Half-width of the integration window as a fraction of m/z
    pub fn with_window_fraction(mut self, fraction: f64) -> Self {
        self.window_fraction = fraction;
        self
    }

    /// Rows with `ccs_stddev >= max_relative_stddev × ccs` are dropped
    pub fn with_max_relative_stddev(mut self, fraction: f64) -> Self {
        self.max_relative_stddev = fraction;
        self
    }

    /// Abundance of `charge` in `spectrum`
    pub fn scale_factor(&self, spectrum: &MassSpectrum, charge: u32) -> f64 {
        let mz = charge_state_mz(self.mass, charge);
        spectrum.window_sum(
            mz * (1.0 - self.window_fraction),
            mz * (1.0 + self.window_fraction),
        )
    }

    /// Normalize per charge state and scale by abundance
    pub fn scale(&self, rows: &[CcsRow], spectrum: &MassSpectrum) -> Vec<ScaledRow> {
        let kept: Vec<&CcsRow> = rows
            .iter()
            .filter(|r| r.ccs_stddev < self.max_relative_stddev * r.ccs)
            .collect();

        let mut maxima: BTreeMap<u32, f64> = BTreeMap::new();
        let mut factors: BTreeMap<u32, f64> = BTreeMap::new();
        for row in &kept {
            let max = maxima.entry(row.charge).or_insert(f64::NEG_INFINITY);
            *max = max.max(row.intensity);
            factors
                .entry(row.charge)
                .or_insert_with(|| self.scale_factor(spectrum, row.charge));
        }

        kept.into_iter()
            .map(|row| {
                let max = maxima[&row.charge];
                let normalized = if max > 0.0 { row.intensity / max } else { 0.0 };
                let scale_factor = factors[&row.charge];
                ScaledRow {
                    row: *row,
                    scale_factor,
                    normalized,
                    scaled: normalized * scale_factor,
                }
            })
            .collect()
    }
}
