//! Gaussian peak models and goodness-of-fit statistics.

use serde::{Deserialize, Serialize};

/// Conversion factor between a Gaussian's FWHM and its standard deviation
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// A curve with analytic partial derivatives, fitted by the least-squares solver
pub trait CurveModel {
    /// Number of parameters in the model's parameter vector
    fn parameter_count(&self) -> usize;

    /// Model value at `x`
    fn value(&self, x: f64, params: &[f64]) -> f64;

    /// Partial derivatives of the model value at `x` with respect to each parameter.
    ///
    /// `grad` has length [`CurveModel::parameter_count`].
    fn partials(&self, x: f64, params: &[f64], grad: &mut [f64]);

    /// Evaluate the model over all sample positions
    fn predict(&self, xs: &[f64], params: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.value(x, params)).collect()
    }
}

/// `amplitude * exp(-(x - center)² / (2 * width²))`
#[inline]
pub fn gaussian(x: f64, amplitude: f64, center: f64, width: f64) -> f64 {
    amplitude * (-(x - center).powi(2) / (2.0 * width * width)).exp()
}

/// One Gaussian component of a composite fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianComponent {
    /// Peak height
    pub amplitude: f64,
    /// Peak position (CCS in Å² for composite fits)
    pub center: f64,
    /// Standard deviation
    pub width: f64,
}

impl GaussianComponent {
    /// Create a component
    pub fn new(amplitude: f64, center: f64, width: f64) -> Self {
        Self {
            amplitude,
            center,
            width,
        }
    }

    /// Component value at `x`
    pub fn value(&self, x: f64) -> f64 {
        gaussian(x, self.amplitude, self.center, self.width)
    }

    /// Full width at half maximum
    pub fn fwhm(&self) -> f64 {
        self.width * FWHM_PER_SIGMA
    }

    /// Flatten a list of components into `[amp₁, center₁, width₁, amp₂, ...]`
    pub fn flatten(components: &[GaussianComponent]) -> Vec<f64> {
        components
            .iter()
            .flat_map(|c| [c.amplitude, c.center, c.width])
            .collect()
    }

    /// Inverse of [`GaussianComponent::flatten`]; trailing values that do not
    /// form a full triple are ignored
    pub fn unflatten(params: &[f64]) -> Vec<GaussianComponent> {
        params
            .chunks_exact(3)
            .map(|p| GaussianComponent::new(p[0], p[1], p[2]))
            .collect()
    }
}

/// Sum of `components` Gaussians with parameters laid out in triples
#[derive(Debug, Clone, Copy)]
pub struct GaussianSum {
    components: usize,
}

impl GaussianSum {
    /// Model with `components` Gaussians
    pub fn new(components: usize) -> Self {
        Self { components }
    }
}

impl CurveModel for GaussianSum {
    fn parameter_count(&self) -> usize {
        self.components * 3
    }

    fn value(&self, x: f64, params: &[f64]) -> f64 {
        params
            .chunks_exact(3)
            .map(|p| gaussian(x, p[0], p[1], p[2]))
            .sum()
    }

    fn partials(&self, x: f64, params: &[f64], grad: &mut [f64]) {
        for (p, g) in params.chunks_exact(3).zip(grad.chunks_exact_mut(3)) {
            let (amplitude, center, width) = (p[0], p[1], p[2]);
            let dx = x - center;
            let w2 = width * width;
            let e = (-dx * dx / (2.0 * w2)).exp();
            g[0] = e;
            g[1] = amplitude * e * dx / w2;
            g[2] = amplitude * e * dx * dx / (w2 * width);
        }
    }
}

/// Wraps a model so that only a subset of its parameters is free.
///
/// Fixed values are spliced back into the full vector before every
/// evaluation; the solver only ever sees the free slice.
#[derive(Debug, Clone)]
pub struct MaskedModel<'m, M: CurveModel> {
    inner: &'m M,
    full: Vec<f64>,
    free: Vec<usize>,
}

impl<'m, M: CurveModel> MaskedModel<'m, M> {
    /// `full` holds the complete parameter vector (fixed values included),
    /// `free` the indices that the solver may vary
    pub fn new(inner: &'m M, full: Vec<f64>, free: Vec<usize>) -> Self {
        Self { inner, full, free }
    }

    /// Initial values of the free parameters
    pub fn free_values(&self) -> Vec<f64> {
        self.free.iter().map(|&i| self.full[i]).collect()
    }

    /// Rebuild the complete parameter vector from a free-parameter vector
    pub fn splice(&self, free_params: &[f64]) -> Vec<f64> {
        let mut full = self.full.clone();
        for (&i, &v) in self.free.iter().zip(free_params.iter()) {
            full[i] = v;
        }
        full
    }
}

impl<M: CurveModel> CurveModel for MaskedModel<'_, M> {
    fn parameter_count(&self) -> usize {
        self.free.len()
    }

    fn value(&self, x: f64, params: &[f64]) -> f64 {
        self.inner.value(x, &self.splice(params))
    }

    fn partials(&self, x: f64, params: &[f64], grad: &mut [f64]) {
        let full = self.splice(params);
        let mut full_grad = vec![0.0; full.len()];
        self.inner.partials(x, &full, &mut full_grad);
        for (g, &i) in grad.iter_mut().zip(self.free.iter()) {
            *g = full_grad[i];
        }
    }
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// Returns 0 when the observations have no variance.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    let n = observed.len();
    if n == 0 {
        return 0.0;
    }
    let mean = observed.iter().sum::<f64>() / n as f64;
    let ss_res: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

/// Root-mean-square error between observations and predictions
pub fn rmse(observed: &[f64], predicted: &[f64]) -> f64 {
    let n = observed.len();
    if n == 0 {
        return 0.0;
    }
    let ss: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    (ss / n as f64).sqrt()
}
