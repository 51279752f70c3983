//! Bounded Levenberg–Marquardt nonlinear least squares.
//!
//! Parameters are projected onto their box bounds after every trial step.
//! The damping term is scaled by the diagonal of `JᵀJ` (Marquardt scaling),
//! which keeps steps sensible when amplitudes, centers and widths differ by
//! orders of magnitude.

use log::trace;
use nalgebra::{DMatrix, DVector};

use super::model::CurveModel;
use super::FitError;

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const DIAGONAL_FLOOR: f64 = 1e-12;

/// Solver settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    max_iter: usize,
    tolerance: f64,
    initial_damping: f64,
}

impl FitConfig {
    /// Maximum number of accepted or rejected Jacobian evaluations
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Relative tolerance on cost reduction and step size
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Starting Levenberg–Marquardt damping factor
    pub fn initial_damping(mut self, initial_damping: f64) -> Self {
        self.initial_damping = initial_damping;
        self
    }

    /// Configured iteration cap
    pub fn iteration_limit(&self) -> usize {
        self.max_iter
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iter: 1_000,
            tolerance: 1e-10,
            initial_damping: 1e-3,
        }
    }
}

/// Box constraints on a parameter vector
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Create bounds; every lower value must not exceed its upper value
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, FitError> {
        if lower.len() != upper.len() {
            return Err(FitError::ParameterCountMismatch {
                expected: lower.len(),
                got: upper.len(),
            });
        }
        if let Some(index) = lower
            .iter()
            .zip(upper.iter())
            .position(|(lo, hi)| lo > hi || lo.is_nan() || hi.is_nan())
        {
            return Err(FitError::InvalidBounds {
                index,
                lower: lower[index],
                upper: upper[index],
            });
        }
        Ok(Self { lower, upper })
    }

    /// No constraints on `n` parameters
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    /// Number of constrained parameters
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// True when no parameters are constrained
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Keep only the entries listed in `indices`
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            lower: indices.iter().map(|&i| self.lower[i]).collect(),
            upper: indices.iter().map(|&i| self.upper[i]).collect(),
        }
    }

    /// Project `params` onto the box
    pub fn clamp(&self, params: &mut [f64]) {
        for ((p, lo), hi) in params.iter_mut().zip(&self.lower).zip(&self.upper) {
            *p = p.clamp(*lo, *hi);
        }
    }
}

/// Result of a solver run
#[derive(Debug, Clone, PartialEq)]
pub struct SolverReport {
    /// Final parameter vector
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params`
    pub cost: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether a convergence criterion was met before `max_iter`
    pub converged: bool,
}

fn residuals<M: CurveModel + ?Sized>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    params: &[f64],
) -> Result<(DVector<f64>, f64), FitError> {
    let r = DVector::from_iterator(
        xs.len(),
        xs.iter().zip(ys).map(|(&x, &y)| y - model.value(x, params)),
    );
    let cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(FitError::NonFiniteResidual);
    }
    Ok((r, cost))
}

fn jacobian<M: CurveModel + ?Sized>(model: &M, xs: &[f64], params: &[f64]) -> DMatrix<f64> {
    let n = params.len();
    let mut j = DMatrix::zeros(xs.len(), n);
    let mut grad = vec![0.0; n];
    for (row, &x) in xs.iter().enumerate() {
        model.partials(x, params, &mut grad);
        for (col, g) in grad.iter().enumerate() {
            j[(row, col)] = *g;
        }
    }
    j
}

fn solve_damped(jtj: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        a[(i, i)] += lambda * jtj[(i, i)].max(DIAGONAL_FLOOR);
    }
    match a.clone().cholesky() {
        Some(chol) => Some(chol.solve(g)),
        None => a.lu().solve(g),
    }
}

/// Minimize `Σ (y - model(x; p))²` starting from `initial`, within `bounds`.
///
/// Returns `Err` only when the problem is malformed (length mismatches,
/// too few samples, non-finite residuals at the starting point). Hitting
/// the iteration cap is reported through [`SolverReport::converged`].
pub fn levenberg_marquardt<M: CurveModel + ?Sized>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    initial: &[f64],
    bounds: &Bounds,
    config: &FitConfig,
) -> Result<SolverReport, FitError> {
    let n = model.parameter_count();
    if initial.len() != n {
        return Err(FitError::ParameterCountMismatch {
            expected: n,
            got: initial.len(),
        });
    }
    if bounds.len() != n {
        return Err(FitError::ParameterCountMismatch {
            expected: n,
            got: bounds.len(),
        });
    }
    if xs.len() != ys.len() {
        return Err(FitError::ParameterCountMismatch {
            expected: xs.len(),
            got: ys.len(),
        });
    }
    if xs.len() < n {
        return Err(FitError::InsufficientData {
            points: xs.len(),
            required: n,
        });
    }

    let mut params = initial.to_vec();
    bounds.clamp(&mut params);
    let (mut r, mut cost) = residuals(model, xs, ys, &params)?;

    let tol = config.tolerance;
    let mut lambda = config.initial_damping;
    let mut iterations = 0;

    while iterations < config.max_iter {
        iterations += 1;
        if cost == 0.0 {
            return Ok(SolverReport {
                params,
                cost,
                iterations,
                converged: true,
            });
        }

        let j = jacobian(model, xs, &params);
        let jt = j.transpose();
        let jtj = &jt * &j;
        let g = &jt * &r;

        if g.amax() <= f64::EPSILON * cost.sqrt() {
            // Stationary point
            return Ok(SolverReport {
                params,
                cost,
                iterations,
                converged: true,
            });
        }

        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let Some(delta) = solve_damped(&jtj, &g, lambda) else {
                lambda *= 10.0;
                continue;
            };

            let mut trial: Vec<f64> = params
                .iter()
                .zip(delta.iter())
                .map(|(p, d)| p + d)
                .collect();
            bounds.clamp(&mut trial);

            let trial_cost = residuals(model, xs, ys, &trial).ok();
            match trial_cost {
                Some((trial_r, trial_cost)) if trial_cost < cost => {
                    let step: f64 = trial
                        .iter()
                        .zip(params.iter())
                        .map(|(a, b)| (a - b).powi(2))
                        .sum::<f64>()
                        .sqrt();
                    let scale: f64 = params.iter().map(|p| p * p).sum::<f64>().sqrt();
                    let reduction = cost - trial_cost;

                    params = trial;
                    r = trial_r;
                    let previous = cost;
                    cost = trial_cost;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);
                    accepted = true;

                    if reduction <= tol * previous || step <= tol * (scale + tol) {
                        trace!("LM converged after {iterations} iterations, cost {cost:.6e}");
                        return Ok(SolverReport {
                            params,
                            cost,
                            iterations,
                            converged: true,
                        });
                    }
                    break;
                }
                _ => lambda *= 10.0,
            }
        }

        if !accepted {
            // No downhill step exists at any damping: local minimum within
            // floating point resolution (or pinned against a bound).
            trace!("LM stalled at iteration {iterations}, cost {cost:.6e}");
            return Ok(SolverReport {
                params,
                cost,
                iterations,
                converged: true,
            });
        }
    }

    Ok(SolverReport {
        params,
        cost,
        iterations,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::model::GaussianSum;

    struct Line;

    impl CurveModel for Line {
        fn parameter_count(&self) -> usize {
            2
        }
        fn value(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * x + p[1]
        }
        fn partials(&self, x: f64, _p: &[f64], grad: &mut [f64]) {
            grad[0] = x;
            grad[1] = 1.0;
        }
    }

    #[test]
    fn test_fits_straight_line() {
        let xs: Vec<f64> = (0..10).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 2.0).collect();
        let report = levenberg_marquardt(
            &Line,
            &xs,
            &ys,
            &[0.0, 0.0],
            &Bounds::unbounded(2),
            &FitConfig::default(),
        )
        .unwrap();
        assert!(report.converged);
        assert!((report.params[0] - 3.0).abs() < 1e-6);
        assert!((report.params[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_respects_bounds() {
        let xs: Vec<f64> = (0..10).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 2.0).collect();
        let bounds = Bounds::new(vec![0.0, 0.0], vec![2.0, 10.0]).unwrap();
        let report =
            levenberg_marquardt(&Line, &xs, &ys, &[1.0, 1.0], &bounds, &FitConfig::default())
                .unwrap();
        assert!(report.params[0] <= 2.0);
        assert!(report.params[1] >= 0.0);
    }

    #[test]
    fn test_recovers_gaussian_from_nearby_start() {
        let model = GaussianSum::new(1);
        let xs: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
        let truth = [100.0, 5.0, 0.5];
        let ys = model.predict(&xs, &truth);
        let report = levenberg_marquardt(
            &model,
            &xs,
            &ys,
            &[80.0, 4.7, 0.8],
            &Bounds::new(vec![0.0, 0.0, 1e-9], vec![f64::INFINITY, 10.0, f64::INFINITY])
                .unwrap(),
            &FitConfig::default(),
        )
        .unwrap();
        for (fitted, expected) in report.params.iter().zip(truth.iter()) {
            assert!((fitted - expected).abs() / expected < 1e-4);
        }
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let model = GaussianSum::new(1);
        let xs: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
        let ys = model.predict(&xs, &[100.0, 5.0, 0.5]);
        let report = levenberg_marquardt(
            &model,
            &xs,
            &ys,
            &[50.0, 3.0, 2.0],
            &Bounds::unbounded(3),
            &FitConfig::default().max_iter(1),
        )
        .unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(matches!(
            Bounds::new(vec![1.0], vec![0.0]),
            Err(FitError::InvalidBounds { index: 0, .. })
        ));
        let result = levenberg_marquardt(
            &Line,
            &[1.0],
            &[1.0],
            &[0.0, 0.0],
            &Bounds::unbounded(2),
            &FitConfig::default(),
        );
        assert!(matches!(
            result,
            Err(FitError::InsufficientData { points: 1, required: 2 })
        ));
    }
}
