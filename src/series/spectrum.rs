//! CCS spectra and resampling onto shared grids.

use serde::{Deserialize, Serialize};

use super::SeriesError;

/// Number of grid points used when summing charge states onto a common axis
pub const DEFAULT_GRID_POINTS: usize = 1000;

/// Intensity as a function of collision cross section (Å²).
///
/// The point order is whatever the producer emitted; use [`CcsSpectrum::sorted`]
/// before anything that assumes a monotonic CCS axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CcsSpectrum {
    ccs: Vec<f64>,
    intensity: Vec<f64>,
}

impl CcsSpectrum {
    /// Create a spectrum from parallel arrays
    pub fn new(ccs: Vec<f64>, intensity: Vec<f64>) -> Result<Self, SeriesError> {
        if ccs.len() != intensity.len() {
            return Err(SeriesError::ArrayLengthMismatch {
                time_len: ccs.len(),
                intensity_len: intensity.len(),
            });
        }
        if let Some(index) = ccs
            .iter()
            .zip(intensity.iter())
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(SeriesError::NonFinite { index });
        }
        Ok(Self { ccs, intensity })
    }

    /// Create a spectrum from `(ccs, intensity)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (ccs, intensity): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        Self::new(ccs, intensity)
    }

    /// CCS axis values
    pub fn ccs(&self) -> &[f64] {
        &self.ccs
    }

    /// Intensity values
    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.ccs.len()
    }

    /// True when the spectrum has no points
    pub fn is_empty(&self) -> bool {
        self.ccs.is_empty()
    }

    /// Iterate over `(ccs, intensity)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ccs.iter().copied().zip(self.intensity.iter().copied())
    }

    /// Smallest and largest CCS value, `None` when empty
    pub fn domain(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let lo = self.ccs.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = self.ccs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((lo, hi))
    }

    /// Largest intensity value (0 when empty)
    pub fn max_intensity(&self) -> f64 {
        self.intensity.iter().copied().fold(0.0, f64::max)
    }

    /// Copy sorted by CCS with duplicate CCS values collapsed (first occurrence kept)
    pub fn sorted(&self) -> Self {
        let mut pairs: Vec<(f64, f64)> = self.iter().collect();
        // Stable sort keeps the first duplicate in front
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs.dedup_by(|next, kept| next.0 == kept.0);
        let (ccs, intensity) = pairs.into_iter().unzip();
        Self { ccs, intensity }
    }

    /// Copy keeping only points with strictly positive intensity
    pub fn positive_only(&self) -> Self {
        let (ccs, intensity) = self.iter().filter(|(_, y)| *y > 0.0).unzip();
        Self { ccs, intensity }
    }

    /// Linearly interpolate this spectrum onto `grid`.
    ///
    /// Grid points outside the spectrum's own CCS domain evaluate to exactly 0.
    /// Spectra with fewer than two distinct points contribute 0 everywhere.
    pub fn interpolate(&self, grid: &[f64]) -> Vec<f64> {
        let sorted = self.sorted();
        let xs = &sorted.ccs;
        let ys = &sorted.intensity;
        if xs.len() < 2 {
            return vec![0.0; grid.len()];
        }
        let first = xs[0];
        let last = xs[xs.len() - 1];

        grid.iter()
            .map(|&x| {
                if x < first || x > last {
                    return 0.0;
                }
                if x == last {
                    return ys[ys.len() - 1];
                }
                // xs[i] <= x < xs[i + 1]
                let i = xs.partition_point(|&v| v <= x) - 1;
                let (x0, x1) = (xs[i], xs[i + 1]);
                let (y0, y1) = (ys[i], ys[i + 1]);
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            })
            .collect()
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

/// Position of the value closest to `target` (first one on ties), `None` when empty
pub fn nearest_position(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().enumerate() {
        let d = (v - target).abs();
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Resample every spectrum onto `grid` and sum pointwise
pub fn sum_onto_grid(spectra: &[CcsSpectrum], grid: &[f64]) -> CcsSpectrum {
    let mut summed = vec![0.0; grid.len()];
    for spectrum in spectra {
        for (acc, y) in summed.iter_mut().zip(spectrum.interpolate(grid)) {
            *acc += y;
        }
    }
    CcsSpectrum {
        ccs: grid.to_vec(),
        intensity: summed,
    }
}

/// Sum charge-state spectra onto a common grid spanning their joint CCS domain
pub fn summed_spectrum(spectra: &[CcsSpectrum], grid_points: usize) -> CcsSpectrum {
    let domain = spectra
        .iter()
        .filter_map(CcsSpectrum::domain)
        .reduce(|(lo_a, hi_a), (lo_b, hi_b)| (lo_a.min(lo_b), hi_a.max(hi_b)));

    match domain {
        Some((lo, hi)) => sum_onto_grid(spectra, &linspace(lo, hi, grid_points)),
        None => CcsSpectrum::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_collapses_duplicates() {
        let s = CcsSpectrum::new(vec![3.0, 1.0, 3.0, 2.0], vec![30.0, 10.0, 99.0, 20.0]).unwrap();
        let sorted = s.sorted();
        assert_eq!(sorted.ccs(), &[1.0, 2.0, 3.0]);
        assert_eq!(sorted.intensity(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_interpolate_inside_and_outside_domain() {
        let s = CcsSpectrum::new(vec![100.0, 200.0], vec![0.0, 10.0]).unwrap();
        let values = s.interpolate(&[50.0, 100.0, 150.0, 200.0, 250.0]);
        assert_eq!(values, vec![0.0, 0.0, 5.0, 10.0, 0.0]);
    }

    #[test]
    fn test_sum_on_shared_grid_is_elementwise() {
        let grid = vec![100.0, 110.0, 120.0, 130.0];
        let a = CcsSpectrum::new(grid.clone(), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = CcsSpectrum::new(grid.clone(), vec![10.0, 20.0, 30.0, 40.0]).unwrap();
        let summed = sum_onto_grid(&[a, b], &grid);
        assert_eq!(summed.intensity(), &[11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn test_sum_non_overlapping_domains() {
        let a = CcsSpectrum::new(vec![100.0, 200.0], vec![5.0, 5.0]).unwrap();
        let b = CcsSpectrum::new(vec![300.0, 400.0], vec![7.0, 7.0]).unwrap();
        let summed = sum_onto_grid(&[a, b], &[150.0, 250.0, 350.0]);
        assert_eq!(summed.intensity(), &[5.0, 0.0, 7.0]);
    }

    #[test]
    fn test_summed_spectrum_spans_joint_domain() {
        let a = CcsSpectrum::new(vec![100.0, 200.0], vec![1.0, 1.0]).unwrap();
        let b = CcsSpectrum::new(vec![150.0, 400.0], vec![1.0, 1.0]).unwrap();
        let summed = summed_spectrum(&[a, b], 11);
        assert_eq!(summed.len(), 11);
        assert_eq!(summed.domain(), Some((100.0, 400.0)));
    }

    #[test]
    fn test_nearest_position_prefers_first() {
        assert_eq!(nearest_position(&[3.0, 1.0, 2.0, 1.0], 1.1), Some(1));
        assert_eq!(nearest_position(&[1.0, 3.0], 2.0), Some(0));
        assert_eq!(nearest_position(&[], 2.0), None);
    }

    #[test]
    fn test_linspace_endpoints() {
        let grid = linspace(0.0, 1.0, 5);
        assert_eq!(grid, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
