//! # Peak Fitting
//!
//! Gaussian models and the nonlinear least-squares machinery behind both
//! fitters:
//!
//! - [`SinglePeakFitter`] finds the apex of an arrival time distribution
//!   with best-of-k randomized restarts.
//! - [`MultiGaussianFitter`] resolves overlapping conformers in a CCS
//!   spectrum, either auto-seeded from detected peaks or refit with some
//!   parameters held fixed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ccsfit::fitting::{MultiGaussianFitter, FitStore};
//!
//! let fitter = MultiGaussianFitter::default();
//! let mut store = FitStore::new();
//! fitter.auto_fit_into(&mut store, 5u32, &spectrum, 2);
//! ```

mod error;
mod model;
mod multi_gaussian;
pub mod peaks;
mod single_peak;
mod solver;
mod store;

pub use error::FitError;
pub use model::{gaussian, r_squared, rmse, CurveModel, GaussianComponent, GaussianSum, MaskedModel, FWHM_PER_SIGMA};
pub use multi_gaussian::{
    default_seeds, seed_components, CompositeFit, FitCurve, FitOutcome, FixedMask,
    MultiGaussianConfig, MultiGaussianFitter, Parameter, CURVE_POINTS, MAX_COMPONENTS,
};
pub use single_peak::{PeakFitResult, SinglePeakConfig, SinglePeakFitter, MIN_POINTS};
pub use solver::{levenberg_marquardt, Bounds, FitConfig, SolverReport};
pub use store::FitStore;
