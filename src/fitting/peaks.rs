//! Peak detection for seeding composite Gaussian fits.
//!
//! Local maxima are found on a lightly smoothed copy of the intensity trace,
//! filtered by height, separation and prominence, and ranked by prominence.

/// Relative height (fraction of the maximum) a seed peak must reach
pub const MIN_RELATIVE_HEIGHT: f64 = 0.05;
/// Relative prominence (fraction of the maximum) a seed peak must reach
pub const MIN_RELATIVE_PROMINENCE: f64 = 0.02;
/// Minimum peak separation is `len / DISTANCE_DIVISOR` samples (at least 1)
pub const DISTANCE_DIVISOR: usize = 50;

/// A local maximum that survived filtering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedPeak {
    /// Sample index
    pub index: usize,
    /// Value at the peak
    pub height: f64,
    /// Vertical distance to the higher of the two surrounding minima
    pub prominence: f64,
}

/// Local-maximum detector with optional height, distance and prominence filters
#[derive(Debug, Clone, Default)]
pub struct PeakFinder {
    min_height: Option<f64>,
    min_distance: usize,
    min_prominence: Option<f64>,
}

impl PeakFinder {
    /// Detector with no filters
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop peaks lower than `height`
    pub fn with_min_height(mut self, height: f64) -> Self {
        self.min_height = Some(height);
        self
    }

    /// Require at least `distance` samples between retained peaks; the
    /// taller peak wins
    pub fn with_min_distance(mut self, distance: usize) -> Self {
        self.min_distance = distance;
        self
    }

    /// Drop peaks with prominence below `prominence`
    pub fn with_min_prominence(mut self, prominence: f64) -> Self {
        self.min_prominence = Some(prominence);
        self
    }

    /// Peaks in `y`, in index order
    pub fn find(&self, y: &[f64]) -> Vec<DetectedPeak> {
        let mut peaks = local_maxima(y);

        if let Some(height) = self.min_height {
            peaks.retain(|&i| y[i] >= height);
        }
        if self.min_distance > 1 && peaks.len() > 1 {
            peaks = select_by_distance(y, &peaks, self.min_distance);
        }

        let mut detected: Vec<DetectedPeak> = peaks
            .into_iter()
            .map(|index| DetectedPeak {
                index,
                height: y[index],
                prominence: prominence(y, index),
            })
            .collect();

        if let Some(min) = self.min_prominence {
            detected.retain(|p| p.prominence >= min);
        }
        detected
    }
}

/// Indices of local maxima; flat tops report their middle sample.
/// The first and last samples are never maxima.
pub fn local_maxima(y: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if y.len() < 3 {
        return peaks;
    }
    let last = y.len() - 1;
    let mut i = 1;
    while i < last {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < last && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(y: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut priority: Vec<usize> = (0..peaks.len()).collect();
    // Highest first; among equal heights the later index is visited first
    priority.sort_by(|&a, &b| y[peaks[b]].total_cmp(&y[peaks[a]]).then(b.cmp(&a)));

    for &j in &priority {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Prominence of the peak at `index`.
///
/// Walks outward in both directions until a strictly higher sample or the
/// edge is reached, tracking the lowest value on each side.
pub fn prominence(y: &[f64], index: usize) -> f64 {
    let peak = y[index];

    let mut left_min = peak;
    for &v in y[..=index].iter().rev() {
        if v > peak {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = peak;
    for &v in &y[index..] {
        if v > peak {
            break;
        }
        right_min = right_min.min(v);
    }

    peak - left_min.max(right_min)
}

/// One-dimensional Gaussian filter with reflected edges, truncated at 4σ
pub fn gaussian_smooth(y: &[f64], sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || y.is_empty() {
        return y.to_vec();
    }
    let radius = (4.0 * sigma + 0.5) as usize;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let d = k as f64 - radius as f64;
            (-0.5 * d * d / (sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);

    let n = y.len() as isize;
    let reflect = |mut i: isize| -> usize {
        // (d c b a | a b c d | d c b a)
        loop {
            if i < 0 {
                i = -i - 1;
            } else if i >= n {
                i = 2 * n - i - 1;
            } else {
                return i as usize;
            }
        }
    };

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * y[reflect(i + k as isize - radius as isize)])
                .sum()
        })
        .collect()
}

/// Pick `n` seed indices for a composite fit of `y`.
///
/// The most prominent peaks of the smoothed trace come first. Missing seeds
/// are placed in the middle of the largest gap between already chosen
/// indices (the trace edges count as boundaries). Without any peak the seeds
/// are spread evenly between `len / 10` and `len - len / 10`.
pub fn seed_indices(y: &[f64], n: usize, smoothing_sigma: f64) -> Vec<usize> {
    let len = y.len();
    if len == 0 || n == 0 {
        return Vec::new();
    }

    let smooth = gaussian_smooth(y, smoothing_sigma);
    let y_max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let distance = (len / DISTANCE_DIVISOR).max(1);

    let mut peaks = PeakFinder::new()
        .with_min_height(y_max * MIN_RELATIVE_HEIGHT)
        .with_min_distance(distance)
        .with_min_prominence(y_max * MIN_RELATIVE_PROMINENCE)
        .find(&smooth);
    if peaks.is_empty() {
        peaks = PeakFinder::new().with_min_distance(distance).find(&smooth);
    }

    if peaks.is_empty() {
        let lo = (len / 10) as f64;
        let hi = (len - len / 10) as f64;
        let mut seeds: Vec<usize> = crate::series::linspace(lo, hi, n)
            .into_iter()
            .map(|v| (v as usize).min(len - 1))
            .collect();
        seeds.sort_unstable();
        return seeds;
    }

    peaks.sort_by(|a, b| b.prominence.total_cmp(&a.prominence));
    let mut seeds: Vec<usize> = peaks.iter().take(n).map(|p| p.index).collect();

    while seeds.len() < n {
        seeds.sort_unstable();
        let mut boundaries = Vec::with_capacity(seeds.len() + 2);
        boundaries.push(0);
        boundaries.extend_from_slice(&seeds);
        boundaries.push(len - 1);

        let mut widest = (0, 0);
        for pair in boundaries.windows(2) {
            if pair[1] - pair[0] > widest.1 - widest.0 {
                widest = (pair[0], pair[1]);
            }
        }
        seeds.push((widest.0 + widest.1) / 2);
    }

    seeds.sort_unstable();
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_peaks(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let x = i as f64;
                100.0 * (-(x - 30.0).powi(2) / 50.0).exp() + 40.0 * (-(x - 70.0).powi(2) / 50.0).exp()
            })
            .collect()
    }

    #[test]
    fn test_local_maxima_plateau_midpoint() {
        let y = [0.0, 1.0, 3.0, 3.0, 3.0, 1.0, 2.0, 0.0];
        assert_eq!(local_maxima(&y), vec![3, 6]);
        assert!(local_maxima(&[1.0, 0.0]).is_empty());
    }

    #[test]
    fn test_prominence_uses_higher_saddle() {
        let y = [0.0, 5.0, 2.0, 8.0, 1.0];
        assert_eq!(prominence(&y, 1), 3.0);
        assert_eq!(prominence(&y, 3), 7.0);
    }

    #[test]
    fn test_distance_keeps_tallest() {
        let y = [0.0, 5.0, 0.0, 7.0, 0.0, 6.0, 0.0];
        let peaks = PeakFinder::new().with_min_distance(3).find(&y);
        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![3]);
    }

    #[test]
    fn test_smoothing_preserves_constant_and_mass() {
        let flat = vec![2.0; 20];
        for v in gaussian_smooth(&flat, 1.0) {
            assert!((v - 2.0).abs() < 1e-12);
        }
        let mut spike = vec![0.0; 21];
        spike[10] = 1.0;
        let smoothed = gaussian_smooth(&spike, 1.0);
        let total: f64 = smoothed.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(smoothed[10] < 1.0 && smoothed[9] > 0.0);
    }

    #[test]
    fn test_seeds_ranked_by_prominence() {
        let y = two_peaks(100);
        assert_eq!(seed_indices(&y, 1, 1.0), vec![30]);
        assert_eq!(seed_indices(&y, 2, 1.0), vec![30, 70]);
    }

    #[test]
    fn test_seeds_fill_largest_gap() {
        let y = two_peaks(100);
        let seeds = seed_indices(&y, 3, 1.0);
        assert_eq!(seeds.len(), 3);
        // Gaps: 0..30, 30..70, 70..99; the middle one is widest
        assert_eq!(seeds, vec![30, 50, 70]);
    }

    #[test]
    fn test_seeds_without_peaks_are_evenly_spread() {
        let y: Vec<f64> = (0..100).map(f64::from).collect();
        let seeds = seed_indices(&y, 3, 1.0);
        assert_eq!(seeds, vec![10, 50, 90]);
    }
}
