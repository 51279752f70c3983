//! # Mapping
//!
//! Applying a [`CalibrationTable`](crate::calibration::CalibrationTable) to
//! raw measurements:
//!
//! - [`CcsMapper`] pairs every calibration entry of an analyte charge state
//!   with the raw intensity nearest to its drift time.
//! - [`ChargeStateScaler`] normalizes mapped distributions per charge state
//!   and weights them by mass-spectral abundance.
//! - [`map_ciu`] places a collision-induced unfolding extract on a CCS axis.

mod ciu;
mod mapper;
mod scaling;

pub use ciu::{map_ciu, CiuConfig, CiuExtract, CiuRow};
pub use mapper::{CcsMapper, CcsRow, MappedSpectrum, MapperConfig, MappingBatch, MappingInput};
pub use scaling::{charge_state_mz, ChargeStateScaler, MassSpectrum, ScaledRow, PROTON_MASS};
