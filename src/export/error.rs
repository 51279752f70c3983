/// Errors that can occur while writing result files
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the CSV writer
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from the Arrow library during array operations
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Error from the Parquet library during file writing
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Spectrum arrays of different lengths
    #[error("Array length mismatch: CCS array has {ccs_len} elements, intensity array has {intensity_len} elements")]
    ArrayLengthMismatch {
        /// Length of the CCS array
        ccs_len: usize,
        /// Length of the intensity array
        intensity_len: usize,
    },
}
