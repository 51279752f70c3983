use std::path::PathBuf;

use crate::series::SeriesError;

/// Errors that can occur while reading input files
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the CSV reader
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Malformed line in a text table
    #[error("Parse error at line {line}: {message}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Parsed values do not form a valid series
    #[error("Invalid series: {0}")]
    InvalidSeries(#[from] SeriesError),

    /// Table without a header row
    #[error("Missing header row")]
    MissingHeader,

    /// Directory that is not laid out as expected
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}
