//! # ccsfit - CCS Calibration and Peak Fitting for Ion Mobility
//!
//! `ccsfit` converts raw ion-mobility arrival time distributions (ATDs) into
//! collision cross section (CCS) spectra and resolves overlapping conformer
//! peaks within them.
//!
//! ## Key Features
//!
//! - **Multi-start single-peak fitting**: randomized restarts of a bounded
//!   Levenberg–Marquardt Gaussian fit, keeping the best R².
//!
//! - **Two calibration strategies**: traveling-wave calibration against
//!   literature CCS values, serialized for an external CCS calculation tool,
//!   and linear drift-tube calibration with the Mason–Schamp equation.
//!
//! - **CCS mapping**: applies a calibration table to raw distributions, with
//!   charge-state scaling and CIU extract support.
//!
//! - **Composite Gaussian fitting**: auto-seeded joint fits of up to ten
//!   components, plus constrained refits with any parameters held fixed.
//!
//! ## Quick Start
//!
//! ```rust
//! use ccsfit::prelude::*;
//!
//! // A synthetic CCS spectrum with one conformer
//! let ccs: Vec<f64> = (0..200).map(|i| 900.0 + i as f64).collect();
//! let intensity: Vec<f64> = ccs
//!     .iter()
//!     .map(|x| 100.0 * (-(x - 1000.0f64).powi(2) / (2.0 * 20.0f64.powi(2))).exp())
//!     .collect();
//! let spectrum = CcsSpectrum::new(ccs, intensity)?;
//!
//! let fit = MultiGaussianFitter::default().auto_fit(&spectrum, 1);
//! assert!(fit.r_squared > 0.98);
//! # Ok::<(), ccsfit::series::SeriesError>(())
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`series`]: validated arrival time and CCS curves, grid resampling
//! - [`fitting`]: solver, single-peak and composite Gaussian fitters
//! - [`calibration`]: traveling-wave and drift-tube calibrations, calibration tables
//! - [`mapping`]: CCS mapping, charge-state scaling, CIU mapping
//! - [`export`]: CSV, JSON and Parquet writers
//! - [`input`]: text table readers and folder discovery
//! - [`report`]: skipped items and run summaries
//!
//! No numerical operation touches the filesystem; [`input`] and [`export`]
//! are the only modules that do I/O.

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![allow(clippy::too_many_arguments)]

pub mod calibration;
pub mod export;
pub mod fitting;
pub mod input;
pub mod mapping;
pub mod report;
pub mod series;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::calibration::{
        AnalyteIon, CalibrationEntry, CalibrationError, CalibrationTable, CcsReference,
        CellConditions, DriftGas, DriftTubeCalibration, DriftTubeCalibrator, DriftTubeRun,
        InstrumentKind, InstrumentParameters, ReferenceTable, TravelingWaveCalibrator,
        TwimCalibration, VoltageSettings,
    };
    pub use crate::export::{ExportError, RunMetadata, SpectrumWriter, SpectrumWriterConfig};
    pub use crate::fitting::{
        CompositeFit, FitConfig, FitError, FitOutcome, FitStore, FixedMask, GaussianComponent,
        MultiGaussianFitter, Parameter, PeakFitResult, SinglePeakFitter,
    };
    pub use crate::input::InputError;
    pub use crate::mapping::{
        map_ciu, CcsMapper, CcsRow, ChargeStateScaler, MappedSpectrum, MapperConfig,
        MassSpectrum,
    };
    pub use crate::report::{RunReport, SkipReason, SkippedItem};
    pub use crate::series::{ArrivalTimeSeries, CcsSpectrum, SeriesError};
}
