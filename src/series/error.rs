/// Errors raised when raw arrays violate the series invariants
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    /// Time and intensity arrays differ in length
    #[error("Array length mismatch: time array has {time_len} elements, intensity array has {intensity_len} elements")]
    ArrayLengthMismatch {
        /// Length of the time (or CCS) array
        time_len: usize,
        /// Length of the intensity array
        intensity_len: usize,
    },

    /// A value is NaN or infinite
    #[error("Non-finite value at index {index}")]
    NonFinite {
        /// Offending sample index
        index: usize,
    },

    /// Drift times must be strictly increasing
    #[error("Drift times not strictly increasing at index {index}")]
    NotIncreasing {
        /// Index of the first sample that is not greater than its predecessor
        index: usize,
    },

    /// Drift times must be non-negative
    #[error("Negative drift time {value} at index {index}")]
    NegativeTime {
        /// Offending sample index
        index: usize,
        /// Offending value
        value: f64,
    },

    /// The series has no samples
    #[error("Series is empty")]
    Empty,
}
