//! # Series Module
//!
//! Validated in-memory containers for the two curves the engine works with:
//!
//! - [`ArrivalTimeSeries`]: intensity vs. drift time (ms) for one charge state
//! - [`CcsSpectrum`]: intensity vs. collision cross section (Å²)
//!
//! Plus the resampling helpers used to sum several charge states onto one
//! shared CCS grid before fitting.

mod arrival;
mod error;
mod spectrum;

pub use arrival::ArrivalTimeSeries;
pub use error::SeriesError;
pub use spectrum::{
    linspace, nearest_position, sum_onto_grid, summed_spectrum, CcsSpectrum, DEFAULT_GRID_POINTS,
};
