//! # Calibration
//!
//! Turning calibrant measurements into drift time → CCS conversions.
//!
//! Two strategies produce calibrations:
//!
//! - **Traveling wave** ([`TravelingWaveCalibrator`]): fitted apex drift
//!   times of calibrant ions are paired with literature CCS values from a
//!   [`CcsReference`] and serialized for the external CCS calculation tool.
//!   The tool's output is read back into a [`CalibrationTable`] via
//!   [`imscal::import_output`].
//! - **Linear drift tube** ([`DriftTubeCalibrator`]): apex drift times at
//!   several voltages give the dead time `t0`, after which every sample is
//!   converted with the Mason–Schamp equation.

mod drift_tube;
mod error;
pub mod imscal;
mod reference;
mod table;
mod traveling_wave;

pub use drift_tube::{
    ccs_from_mobility, AnalyteIon, ApexPoint, CellConditions, DriftTubeCalibration,
    DriftTubeCalibrator, DriftTubeRow, DriftTubeRun, DriftTubeTable, LinearFit, VoltageSettings,
    BOLTZMANN, DALTON, ELEMENTARY_CHARGE,
};
pub use error::CalibrationError;
pub use reference::{CcsReference, DriftGas, ReferenceRecord, ReferenceTable};
pub use table::{CalibrationEntry, CalibrationKey, CalibrationTable};
pub use traveling_wave::{
    CalibrantInput, CalibrantPoint, InstrumentKind, InstrumentParameters, TravelingWaveCalibrator,
    TwimCalibration,
};
