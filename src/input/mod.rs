//! # Input
//!
//! Readers for the plain-text inputs of the command line tool: two-column
//! arrival time and mass spectrum tables, CIU extract CSVs, and the
//! per-analyte folder layout they are stored in.

mod error;
mod extract;
mod layout;
mod text;

pub use error::InputError;
pub use extract::{read_ciu_extract, read_ciu_extract_file};
pub use layout::{analyte_files, raw_file_charge, raw_series_files, AnalyteFile};
pub use text::{
    read_arrival_series, read_arrival_series_file, read_mass_spectrum_file, read_two_columns,
};
