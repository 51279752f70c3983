use crate::series::SeriesError;

/// Errors that can occur while fitting peak models
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Too few samples for the number of free parameters
    #[error("Insufficient data: {points} points, at least {required} required")]
    InsufficientData {
        /// Number of usable samples
        points: usize,
        /// Minimum number of samples
        required: usize,
    },

    /// Intensities are constant, so R² is undefined
    #[error("Intensity has no variance")]
    NoVariance,

    /// Parameter vector or mask does not match the model
    #[error("Parameter count mismatch: expected {expected}, got {got}")]
    ParameterCountMismatch {
        /// Length the model requires
        expected: usize,
        /// Length that was supplied
        got: usize,
    },

    /// Number of Gaussian components outside the supported range
    #[error("Component count {0} outside supported range 1..=10")]
    InvalidComponentCount(usize),

    /// Lower bound above upper bound
    #[error("Invalid bounds for parameter {index}: lower {lower} > upper {upper}")]
    InvalidBounds {
        /// Parameter index
        index: usize,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// Model produced NaN or infinite residuals
    #[error("Model evaluation produced non-finite residuals")]
    NonFiniteResidual,

    /// Iteration cap reached before convergence
    #[error("Solver did not converge within {iterations} iterations")]
    DidNotConverge {
        /// Iterations performed
        iterations: usize,
    },

    /// Every randomized start failed
    #[error("All {attempts} fit attempts failed")]
    AllAttemptsFailed {
        /// Number of attempts made
        attempts: usize,
    },

    /// Input series was invalid
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}
