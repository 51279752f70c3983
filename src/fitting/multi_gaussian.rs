//! Composite Gaussian fitting of CCS spectra.
//!
//! Two modes share one model and one set of bounds:
//! - [`MultiGaussianFitter::auto_fit`] seeds every component from detected
//!   peaks and fits all 3N parameters jointly. It never fails; when the
//!   optimizer gives up the evenly spaced default seeds are returned instead.
//! - [`MultiGaussianFitter::refit`] starts from caller-supplied components and
//!   varies only the parameters not marked in a [`FixedMask`].

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::model::{rmse, r_squared, CurveModel, GaussianComponent, GaussianSum, MaskedModel};
use super::peaks::seed_indices;
use super::solver::{levenberg_marquardt, Bounds, FitConfig};
use super::store::FitStore;
use super::FitError;
use crate::series::{linspace, CcsSpectrum};

/// Largest number of components a composite fit may have
pub const MAX_COMPONENTS: usize = 10;

/// Number of points used when sampling fitted curves for export
pub const CURVE_POINTS: usize = 1000;

/// How a composite fit was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitOutcome {
    /// The optimizer converged
    Fitted {
        /// Solver iterations
        iterations: usize,
    },
    /// The optimizer failed; components are unfit default seeds
    Fallback {
        /// Why the fit was abandoned
        reason: String,
    },
    /// Every parameter was fixed, so the input was returned unchanged
    NothingToFit,
}

impl FitOutcome {
    /// True for [`FitOutcome::Fitted`]
    pub fn is_fitted(&self) -> bool {
        matches!(self, FitOutcome::Fitted { .. })
    }
}

/// Parameters of one Gaussian component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Peak height
    Amplitude,
    /// Peak position
    Center,
    /// Standard deviation
    Width,
}

impl Parameter {
    /// Position of the parameter inside its component's triple
    pub fn offset(self) -> usize {
        match self {
            Parameter::Amplitude => 0,
            Parameter::Center => 1,
            Parameter::Width => 2,
        }
    }

    /// Parse the single-letter codes `a`, `c`, `w`
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_lowercase() {
            'a' => Some(Parameter::Amplitude),
            'c' => Some(Parameter::Center),
            'w' => Some(Parameter::Width),
            _ => None,
        }
    }
}

/// Which of the 3N parameters are held fixed during a refit.
///
/// Flags are in parameter order `[amp₁, center₁, width₁, amp₂, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedMask {
    flags: Vec<bool>,
}

impl FixedMask {
    /// All parameters of `components` Gaussians free
    pub fn all_free(components: usize) -> Self {
        Self {
            flags: vec![false; components * 3],
        }
    }

    /// All parameters of `components` Gaussians fixed
    pub fn all_fixed(components: usize) -> Self {
        Self {
            flags: vec![true; components * 3],
        }
    }

    /// Mask from explicit flags
    pub fn from_flags(flags: Vec<bool>) -> Self {
        Self { flags }
    }

    /// Fix one parameter of one component (0-based)
    pub fn fix(&mut self, component: usize, parameter: Parameter) -> &mut Self {
        if let Some(flag) = self.flags.get_mut(component * 3 + parameter.offset()) {
            *flag = true;
        }
        self
    }

    /// Whether the parameter at flat `index` is fixed
    pub fn is_fixed(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// Flat indices of the free parameters
    pub fn free_indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, fixed)| (!fixed).then_some(i))
            .collect()
    }

    /// True when no parameter is free
    pub fn is_all_fixed(&self) -> bool {
        self.flags.iter().all(|f| *f)
    }

    /// Number of flags (3N)
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// True when the mask covers no parameters
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// N Gaussian components with goodness-of-fit statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeFit {
    /// Components in seed order
    pub components: Vec<GaussianComponent>,
    /// R² against the fitted spectrum's points
    pub r_squared: f64,
    /// RMSE against the fitted spectrum's points
    pub rmse: f64,
    /// How the components were obtained
    pub outcome: FitOutcome,
}

/// Total and per-component model curves sampled on an even grid
#[derive(Debug, Clone, PartialEq)]
pub struct FitCurve {
    /// Sample positions
    pub ccs: Vec<f64>,
    /// Sum of all components
    pub total: Vec<f64>,
    /// One curve per component
    pub components: Vec<Vec<f64>>,
}

impl CompositeFit {
    /// Number of components
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Flat parameter vector
    pub fn parameters(&self) -> Vec<f64> {
        GaussianComponent::flatten(&self.components)
    }

    /// Model value at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        self.components.iter().map(|c| c.value(x)).sum()
    }

    /// Sample the model over `[lo, hi]`
    pub fn curve(&self, lo: f64, hi: f64, points: usize) -> FitCurve {
        let ccs = linspace(lo, hi, points);
        let components: Vec<Vec<f64>> = self
            .components
            .iter()
            .map(|c| ccs.iter().map(|&x| c.value(x)).collect())
            .collect();
        let total = (0..ccs.len())
            .map(|i| components.iter().map(|curve| curve[i]).sum())
            .collect();
        FitCurve {
            ccs,
            total,
            components,
        }
    }
}

/// Settings for [`MultiGaussianFitter`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiGaussianConfig {
    /// Solver settings for the joint fit
    pub solver: FitConfig,
    /// Standard deviation (in samples) of the smoothing applied before peak detection
    pub smoothing_sigma: f64,
}

impl Default for MultiGaussianConfig {
    fn default() -> Self {
        Self {
            solver: FitConfig::default().max_iter(10_000),
            smoothing_sigma: 1.0,
        }
    }
}

/// Fits sums of Gaussians to CCS spectra
#[derive(Debug, Clone, Default)]
pub struct MultiGaussianFitter {
    config: MultiGaussianConfig,
}

impl MultiGaussianFitter {
    /// Create a fitter
    pub fn new(config: MultiGaussianConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &MultiGaussianConfig {
        &self.config
    }

    /// Seed `n` components from detected peaks and fit them jointly.
    ///
    /// `n` is clamped to `1..=MAX_COMPONENTS`.
    pub fn auto_fit(&self, spectrum: &CcsSpectrum, n: usize) -> CompositeFit {
        let clamped = n.clamp(1, MAX_COMPONENTS);
        if clamped != n {
            warn!("Requested {n} components, using {clamped}");
        }
        let n = clamped;
        let data = fitting_points(spectrum);

        if data.len() < 3 {
            let reason = format!("only {} positive points", data.len());
            warn!("Composite fit skipped: {reason}");
            return finish(&data, default_seeds(&data, n), FitOutcome::Fallback { reason });
        }

        let seeds = seed_components(&data, n, self.config.smoothing_sigma);
        let model = GaussianSum::new(n);
        let initial = GaussianComponent::flatten(&seeds);

        let result = composite_bounds(&data, n).and_then(|bounds| {
            levenberg_marquardt(
                &model,
                data.ccs(),
                data.intensity(),
                &initial,
                &bounds,
                &self.config.solver,
            )
        });

        match result {
            Ok(report) if report.converged => {
                info!(
                    "Fitted {n} Gaussian(s) in {} iterations",
                    report.iterations
                );
                finish(
                    &data,
                    GaussianComponent::unflatten(&report.params),
                    FitOutcome::Fitted {
                        iterations: report.iterations,
                    },
                )
            }
            Ok(report) => {
                let reason = FitError::DidNotConverge {
                    iterations: report.iterations,
                }
                .to_string();
                warn!("Composite fit fell back to default seeds: {reason}");
                finish(&data, default_seeds(&data, n), FitOutcome::Fallback { reason })
            }
            Err(e) => {
                warn!("Composite fit fell back to default seeds: {e}");
                finish(
                    &data,
                    default_seeds(&data, n),
                    FitOutcome::Fallback {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Auto-fit and store the result under `key`, returning the entry it replaced
    pub fn auto_fit_into<K: Ord>(
        &self,
        store: &mut FitStore<K>,
        key: K,
        spectrum: &CcsSpectrum,
        n: usize,
    ) -> Option<CompositeFit> {
        store.upsert(key, self.auto_fit(spectrum, n))
    }

    /// Refit starting from `current`, varying only parameters that `fixed`
    /// leaves free.
    ///
    /// When every parameter is fixed the components come back unchanged with
    /// [`FitOutcome::NothingToFit`] and the optimizer is not run.
    pub fn refit(
        &self,
        spectrum: &CcsSpectrum,
        current: &[GaussianComponent],
        fixed: &FixedMask,
    ) -> Result<CompositeFit, FitError> {
        let n = current.len();
        if n == 0 || n > MAX_COMPONENTS {
            return Err(FitError::InvalidComponentCount(n));
        }
        if fixed.len() != 3 * n {
            return Err(FitError::ParameterCountMismatch {
                expected: 3 * n,
                got: fixed.len(),
            });
        }

        let data = fitting_points(spectrum);
        if fixed.is_all_fixed() {
            debug!("All parameters are fixed, nothing to fit");
            return Ok(finish(&data, current.to_vec(), FitOutcome::NothingToFit));
        }
        if data.len() < 3 {
            return Err(FitError::InsufficientData {
                points: data.len(),
                required: 3,
            });
        }

        let free = fixed.free_indices();
        let model = GaussianSum::new(n);
        let masked = MaskedModel::new(&model, GaussianComponent::flatten(current), free.clone());
        let bounds = composite_bounds(&data, n)?.select(&free);

        let report = levenberg_marquardt(
            &masked,
            data.ccs(),
            data.intensity(),
            &masked.free_values(),
            &bounds,
            &self.config.solver,
        )?;
        if !report.converged {
            return Err(FitError::DidNotConverge {
                iterations: report.iterations,
            });
        }

        info!(
            "Refit {} free parameter(s) in {} iterations",
            free.len(),
            report.iterations
        );
        Ok(finish(
            &data,
            GaussianComponent::unflatten(&masked.splice(&report.params)),
            FitOutcome::Fitted {
                iterations: report.iterations,
            },
        ))
    }
}

/// Sorted, deduplicated, strictly positive points of `spectrum`
fn fitting_points(spectrum: &CcsSpectrum) -> CcsSpectrum {
    spectrum.sorted().positive_only()
}

fn finish(data: &CcsSpectrum, components: Vec<GaussianComponent>, outcome: FitOutcome) -> CompositeFit {
    let model = GaussianSum::new(components.len());
    let params = GaussianComponent::flatten(&components);
    let predicted = model.predict(data.ccs(), &params);
    CompositeFit {
        r_squared: r_squared(data.intensity(), &predicted),
        rmse: rmse(data.intensity(), &predicted),
        components,
        outcome,
    }
}

fn domain_of(data: &CcsSpectrum) -> (f64, f64, f64) {
    let (lo, hi) = data.domain().unwrap_or((0.0, 0.0));
    (lo, hi, hi - lo)
}

/// amplitude ∈ [0, 2·max], center ∈ domain, width ∈ [range·1e-6, range/2]
fn composite_bounds(data: &CcsSpectrum, n: usize) -> Result<Bounds, FitError> {
    let (lo, hi, range) = domain_of(data);
    let y_max = data.max_intensity();
    let mut lower = Vec::with_capacity(3 * n);
    let mut upper = Vec::with_capacity(3 * n);
    for _ in 0..n {
        lower.extend_from_slice(&[0.0, lo, range * 1e-6]);
        upper.extend_from_slice(&[2.0 * y_max, hi, range / 2.0]);
    }
    Bounds::new(lower, upper)
}

/// Components seeded from detected peaks, widths from FWHM
pub fn seed_components(data: &CcsSpectrum, n: usize, smoothing_sigma: f64) -> Vec<GaussianComponent> {
    let x = data.ccs();
    let y = data.intensity();
    let (_, _, range) = domain_of(data);
    let len = y.len();

    seed_indices(y, n, smoothing_sigma)
        .into_iter()
        .map(|idx| {
            let amplitude = y[idx];
            let half = amplitude / 2.0;

            let mut left = idx;
            while left > 0 && y[left] > half {
                left -= 1;
            }
            let mut right = idx;
            while right < len - 1 && y[right] > half {
                right += 1;
            }

            let width = if right > left {
                (x[right] - x[left]) / super::model::FWHM_PER_SIGMA
            } else {
                range / (4.0 * n as f64)
            };
            GaussianComponent::new(
                amplitude,
                x[idx],
                width.clamp(range / 100.0, range / 2.0),
            )
        })
        .collect()
}

/// Evenly spaced components over the middle half of the domain.
///
/// Amplitudes are the observed intensity nearest each center; widths are
/// `range / (4N)`. Empty input yields no components.
pub fn default_seeds(data: &CcsSpectrum, n: usize) -> Vec<GaussianComponent> {
    if data.is_empty() || n == 0 {
        return Vec::new();
    }
    let (lo, hi, range) = domain_of(data);
    let width = if range > 0.0 {
        range / (4.0 * n as f64)
    } else {
        1.0
    };
    let x = data.ccs();
    let y = data.intensity();

    linspace(lo + range / 4.0, hi - range / 4.0, n)
        .into_iter()
        .map(|center| {
            let nearest = x
                .iter()
                .enumerate()
                .min_by(|a, b| (a.1 - center).abs().total_cmp(&(b.1 - center).abs()))
                .map(|(i, _)| i)
                .unwrap_or(0);
            GaussianComponent::new(y[nearest], center, width)
        })
        .collect()
}
