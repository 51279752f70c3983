//! # Export
//!
//! Writers for every tabular result the engine produces: CSV tables of mapped,
//! scaled, CIU and drift-tube data, composite fit parameters (CSV and JSON),
//! sampled fit curves, and a Parquet store of mapped CCS spectra.

mod error;
mod fit_report;
mod spectrum_writer;
mod tables;

pub use error::ExportError;
pub use fit_report::{
    write_curve_csv, write_parameters_csv, write_parameters_json, ComponentParameters, FitSummary,
};
pub use spectrum_writer::{
    create_spectrum_schema, spectrum_columns, RunMetadata, SpectrumWriter, SpectrumWriterConfig,
    SpectrumWriterStats, KEY_RUN_METADATA,
};
pub use tables::{
    write_ccs_rows, write_ciu_rows, write_drift_tube_table, write_scaled_rows, CCS_HEADER,
    SCALED_HEADER,
};
