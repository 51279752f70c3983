//! Raw arrival time distributions.

use serde::{Deserialize, Serialize};

use super::SeriesError;

/// Arrival time distribution (ATD) for one charge state of one analyte.
///
/// Invariants enforced at construction:
/// - Time and intensity arrays have identical lengths.
/// - All values are finite.
/// - Drift times are non-negative and strictly increasing.
///
/// Drift times are in milliseconds, as exported by the acquisition software.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesColumns")]
pub struct ArrivalTimeSeries {
    drift_time: Vec<f64>,
    intensity: Vec<f64>,
}

/// Unvalidated wire form, checked through [`ArrivalTimeSeries::new`]
#[derive(Deserialize)]
struct SeriesColumns {
    drift_time: Vec<f64>,
    intensity: Vec<f64>,
}

impl TryFrom<SeriesColumns> for ArrivalTimeSeries {
    type Error = SeriesError;

    fn try_from(columns: SeriesColumns) -> Result<Self, Self::Error> {
        Self::new(columns.drift_time, columns.intensity)
    }
}

impl ArrivalTimeSeries {
    /// Create a validated series from parallel arrays
    pub fn new(drift_time: Vec<f64>, intensity: Vec<f64>) -> Result<Self, SeriesError> {
        if drift_time.len() != intensity.len() {
            return Err(SeriesError::ArrayLengthMismatch {
                time_len: drift_time.len(),
                intensity_len: intensity.len(),
            });
        }
        if drift_time.is_empty() {
            return Err(SeriesError::Empty);
        }

        for (index, (&t, &y)) in drift_time.iter().zip(intensity.iter()).enumerate() {
            if !t.is_finite() || !y.is_finite() {
                return Err(SeriesError::NonFinite { index });
            }
            if t < 0.0 {
                return Err(SeriesError::NegativeTime { index, value: t });
            }
            if index > 0 && t <= drift_time[index - 1] {
                return Err(SeriesError::NotIncreasing { index });
            }
        }

        Ok(Self {
            drift_time,
            intensity,
        })
    }

    /// Create a validated series from `(drift_time, intensity)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (drift_time, intensity): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        Self::new(drift_time, intensity)
    }

    /// Drift times in milliseconds
    pub fn drift_time(&self) -> &[f64] {
        &self.drift_time
    }

    /// Intensity values
    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.drift_time.len()
    }

    /// Always false for a constructed series; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.drift_time.is_empty()
    }

    /// Iterate over `(drift_time, intensity)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.drift_time
            .iter()
            .copied()
            .zip(self.intensity.iter().copied())
    }

    /// First and last drift time
    pub fn time_range(&self) -> (f64, f64) {
        (self.drift_time[0], self.drift_time[self.len() - 1])
    }

    /// Largest intensity value
    pub fn max_intensity(&self) -> f64 {
        self.intensity
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Index of the most intense sample (first one on ties)
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &y) in self.intensity.iter().enumerate() {
            if y > self.intensity[best] {
                best = i;
            }
        }
        best
    }

    /// Drift time of the most intense sample
    pub fn apex_time(&self) -> f64 {
        self.drift_time[self.argmax()]
    }

    /// Population standard deviation of the drift time axis
    pub fn time_stddev(&self) -> f64 {
        let n = self.len() as f64;
        let mean = self.drift_time.iter().sum::<f64>() / n;
        let var = self
            .drift_time
            .iter()
            .map(|t| (t - mean).powi(2))
            .sum::<f64>()
            / n;
        var.sqrt()
    }

    /// Index of the sample whose drift time is closest to `time_ms`.
    ///
    /// Ties resolve to the earlier sample.
    pub fn nearest_index(&self, time_ms: f64) -> usize {
        let p = self.drift_time.partition_point(|&t| t < time_ms);
        if p == 0 {
            return 0;
        }
        if p == self.len() {
            return self.len() - 1;
        }
        let before = time_ms - self.drift_time[p - 1];
        let after = self.drift_time[p] - time_ms;
        if before <= after {
            p - 1
        } else {
            p
        }
    }

    /// Shift every drift time down by an injection delay (cyclic instruments).
    ///
    /// Samples that would fall before zero are dropped. Fails with
    /// [`SeriesError::Empty`] when no sample is left.
    pub fn subtract_injection_time(&self, injection_ms: f64) -> Result<Self, SeriesError> {
        Self::from_pairs(
            self.iter()
                .map(|(t, y)| (t - injection_ms, y))
                .filter(|(t, _)| *t >= 0.0),
        )
    }
}
