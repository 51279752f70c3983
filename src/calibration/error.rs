use crate::fitting::FitError;
use crate::series::SeriesError;

/// Errors that can occur while building or reading calibrations
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed CSV or a required column is missing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// A text line could not be parsed
    #[error("Parse error at line {line}: {message}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Tool output lacks the `[CALIBRATED DATA]` section
    #[error("No [CALIBRATED DATA] section found")]
    MissingCalibratedData,

    /// No calibrant survived fitting and reference lookup
    #[error("No usable calibrant points")]
    NoCalibrants,

    /// Drift-tube calibration needs more distinct voltages
    #[error("Need at least {required} distinct voltages, got {got}")]
    InsufficientVoltages {
        /// Distinct voltages required
        required: usize,
        /// Distinct voltages available
        got: usize,
    },

    /// Invalid instrument or gas conditions
    #[error("Invalid conditions: {0}")]
    InvalidConditions(String),

    /// Fitting error
    #[error("Fit error: {0}")]
    FitError(#[from] FitError),

    /// Invalid arrival time data
    #[error("Series error: {0}")]
    SeriesError(#[from] SeriesError),
}
