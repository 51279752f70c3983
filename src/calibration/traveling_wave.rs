//! Traveling-wave calibration against literature CCS values.
//!
//! Each calibrant ATD is fitted with a single Gaussian; the apex drift time is
//! paired with the reference CCS and written into the plain-text reference
//! consumed by the external CCS calculation tool.

use std::fmt;
use std::io::Write;

use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;

use super::reference::{CcsReference, DriftGas};
use super::CalibrationError;
use crate::fitting::SinglePeakFitter;
use crate::report::{SkipReason, SkippedItem};
use crate::series::ArrivalTimeSeries;

/// Instrument geometry and wave settings written into the reference header
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstrumentParameters {
    /// Wave velocity (m/s)
    pub velocity: f64,
    /// Wave height (V)
    pub wave_height: f64,
    /// Mobility cell pressure (mbar)
    pub pressure: f64,
    /// Mobility cell length (m)
    pub length: f64,
}

impl Default for InstrumentParameters {
    fn default() -> Self {
        Self {
            velocity: 281.0,
            wave_height: 20.0,
            pressure: 1.63,
            length: 0.98,
        }
    }
}

/// Instrument family, which decides how drift times are corrected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub enum InstrumentKind {
    /// Drift times used as recorded
    #[default]
    Synapt,
    /// Drift times include an injection delay that must be subtracted
    Cyclic {
        /// Injection time (ms)
        injection_ms: f64,
    },
}

impl InstrumentKind {
    /// Injection delay to subtract from drift times (0 for Synapt)
    pub fn injection_ms(&self) -> f64 {
        match self {
            InstrumentKind::Synapt => 0.0,
            InstrumentKind::Cyclic { injection_ms } => *injection_ms,
        }
    }
}

/// One calibrant ATD awaiting calibration
#[derive(Debug, Clone)]
pub struct CalibrantInput {
    /// Analyte name, matched against the reference
    pub analyte: String,
    /// Charge state
    pub charge: u32,
    /// Raw arrival time distribution
    pub series: ArrivalTimeSeries,
}

/// A calibrant that was fitted and found in the reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrantPoint {
    /// Analyte name
    pub analyte: String,
    /// Mass in Da from the reference
    pub mass: f64,
    /// Charge state
    pub charge: u32,
    /// Fitted apex drift time (ms), as recorded
    pub drift_time: f64,
    /// R² of the apex fit
    pub r_squared: f64,
    /// Literature CCS (nm²)
    pub ccs: f64,
}

impl CalibrantPoint {
    /// `{analyte}_{charge}`
    pub fn label(&self) -> String {
        format!("{}_{}", self.analyte, self.charge)
    }
}

/// Outcome of a traveling-wave calibration run
#[derive(Debug, Clone)]
pub struct TwimCalibration {
    /// Instrument settings used for the header
    pub parameters: InstrumentParameters,
    /// Instrument family
    pub instrument: InstrumentKind,
    /// Drift gas the literature values refer to
    pub gas: DriftGas,
    /// Usable calibrants in input order
    pub points: Vec<CalibrantPoint>,
    /// Calibrants left out, with reasons
    pub skipped: Vec<SkippedItem>,
}

impl TwimCalibration {
    /// Drift time of `point` as written into the reference (injection removed)
    pub fn serialized_drift_time(&self, point: &CalibrantPoint) -> f64 {
        point.drift_time - self.instrument.injection_ms()
    }

    /// Write the reference file (the [`Display`](fmt::Display) form)
    pub fn write_reference<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        write!(writer, "{self}")
    }

    /// Write per-calibrant fit results as CSV
    pub fn write_results_csv<W: Write>(&self, writer: W) -> Result<(), CalibrationError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "protein",
            "mass",
            "charge state",
            "drift time",
            "r2",
            "calibrant_value",
        ])?;
        for point in &self.points {
            csv.write_record([
                point.analyte.clone(),
                point.mass.to_string(),
                point.charge.to_string(),
                point.drift_time.to_string(),
                point.r_squared.to_string(),
                point.ccs.to_string(),
            ])?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// Reference file contents: four `#` header lines, then one line per
/// calibrant with the CCS converted from nm² to Å²
impl fmt::Display for TwimCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.parameters;
        writeln!(f, "# length {}", p.length)?;
        writeln!(f, "# velocity {}", p.velocity)?;
        writeln!(f, "# voltage {}", p.wave_height)?;
        writeln!(f, "# pressure {}", p.pressure)?;
        for point in &self.points {
            writeln!(
                f,
                "{} {} {} {} {}",
                point.label(),
                point.mass,
                point.charge,
                point.ccs * 100.0,
                self.serialized_drift_time(point)
            )?;
        }
        Ok(())
    }
}

/// Builds traveling-wave calibrations
#[derive(Debug, Clone)]
pub struct TravelingWaveCalibrator {
    gas: DriftGas,
    parameters: InstrumentParameters,
    instrument: InstrumentKind,
    fitter: SinglePeakFitter,
}

impl TravelingWaveCalibrator {
    /// Calibrator for literature values measured in `gas`
    pub fn new(gas: DriftGas) -> Self {
        Self {
            gas,
            parameters: InstrumentParameters::default(),
            instrument: InstrumentKind::default(),
            fitter: SinglePeakFitter::default(),
        }
    }

    /// Set instrument parameters
    pub fn with_parameters(mut self, parameters: InstrumentParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set instrument family
    pub fn with_instrument(mut self, instrument: InstrumentKind) -> Self {
        self.instrument = instrument;
        self
    }

    /// Set the apex fitter
    pub fn with_fitter(mut self, fitter: SinglePeakFitter) -> Self {
        self.fitter = fitter;
        self
    }

    /// Fit every calibrant and pair it with its reference CCS.
    ///
    /// Calibrants that cannot be fitted or have no reference value are
    /// skipped. Fails only when no calibrant survives.
    pub fn calibrate<C, R>(
        &self,
        inputs: &[CalibrantInput],
        reference: &C,
        rng: &mut R,
    ) -> Result<TwimCalibration, CalibrationError>
    where
        C: CcsReference + ?Sized,
        R: Rng + ?Sized,
    {
        let mut points = Vec::new();
        let mut skipped = Vec::new();

        for input in inputs {
            let label = format!("{}_{}", input.analyte, input.charge);

            let fit = match self.fitter.fit_with_rng(&input.series, rng) {
                Ok(fit) => fit,
                Err(e) => {
                    warn!("Skipping {label}: {e}");
                    skipped.push(SkippedItem::new(label, SkipReason::FitFailed(e.to_string())));
                    continue;
                }
            };

            let Some(record) = reference.record(&input.analyte, input.charge) else {
                warn!("Skipping {label}: not in reference");
                skipped.push(SkippedItem::new(label, SkipReason::NotInReference));
                continue;
            };
            let Some(ccs) = record.ccs(self.gas) else {
                warn!("Skipping {label}: no {} value", self.gas);
                skipped.push(SkippedItem::new(label, SkipReason::NoGasValue(self.gas)));
                continue;
            };

            debug!(
                "{label}: apex {:.4} ms, R² {:.4}, CCS {ccs}",
                fit.center, fit.r_squared
            );
            points.push(CalibrantPoint {
                analyte: input.analyte.clone(),
                mass: record.mass,
                charge: input.charge,
                drift_time: fit.center,
                r_squared: fit.r_squared,
                ccs,
            });
        }

        if points.is_empty() {
            return Err(CalibrationError::NoCalibrants);
        }
        info!(
            "Calibrated {} calibrant(s), skipped {}",
            points.len(),
            skipped.len()
        );

        Ok(TwimCalibration {
            parameters: self.parameters,
            instrument: self.instrument,
            gas: self.gas,
            points,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::reference::{ReferenceRecord, ReferenceTable};
    use crate::fitting::gaussian;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn atd(center: f64) -> ArrivalTimeSeries {
        let t: Vec<f64> = (0..200).map(|i| 0.05 + i as f64 * 0.05).collect();
        let y = t.iter().map(|&x| gaussian(x, 500.0, center, 0.4)).collect();
        ArrivalTimeSeries::new(t, y).unwrap()
    }

    fn reference() -> ReferenceTable {
        let mut table = ReferenceTable::new();
        table.insert(ReferenceRecord {
            analyte: "ubiquitin".into(),
            mass: 8565.0,
            charge: 6,
            ccs_he: Some(15.0),
            ccs_n2: None,
        });
        table.insert(ReferenceRecord {
            analyte: "cytc".into(),
            mass: 12359.0,
            charge: 7,
            ccs_he: Some(15.8),
            ccs_n2: Some(25.2),
        });
        table
    }

    fn inputs() -> Vec<CalibrantInput> {
        vec![
            CalibrantInput {
                analyte: "ubiquitin".into(),
                charge: 6,
                series: atd(4.0),
            },
            CalibrantInput {
                analyte: "cytc".into(),
                charge: 7,
                series: atd(6.0),
            },
            CalibrantInput {
                analyte: "unknown".into(),
                charge: 3,
                series: atd(5.0),
            },
        ]
    }

    #[test]
    fn test_skips_are_recorded_with_reasons() {
        let calibration = TravelingWaveCalibrator::new(DriftGas::Nitrogen)
            .calibrate(&inputs(), &reference(), &mut StdRng::seed_from_u64(1))
            .unwrap();

        assert_eq!(calibration.points.len(), 1);
        assert_eq!(calibration.points[0].label(), "cytc_7");
        assert_eq!(calibration.skipped.len(), 2);
        assert_eq!(
            calibration.skipped[0].reason,
            SkipReason::NoGasValue(DriftGas::Nitrogen)
        );
        assert_eq!(calibration.skipped[1].reason, SkipReason::NotInReference);
    }

    #[test]
    fn test_reference_format_with_injection() {
        let calibration = TravelingWaveCalibrator::new(DriftGas::Helium)
            .with_instrument(InstrumentKind::Cyclic { injection_ms: 1.0 })
            .calibrate(&inputs()[..1], &reference(), &mut StdRng::seed_from_u64(2))
            .unwrap();

        let text = calibration.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[..4],
            &["# length 0.98", "# velocity 281", "# voltage 20", "# pressure 1.63"]
        );

        let fields: Vec<&str> = lines[4].split(' ').collect();
        assert_eq!(&fields[..4], &["ubiquitin_6", "8565", "6", "1500"]);
        let drift: f64 = fields[4].parse().unwrap();
        assert!((drift - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_no_usable_calibrants_is_error() {
        let result = TravelingWaveCalibrator::new(DriftGas::Helium).calibrate(
            &inputs()[2..],
            &reference(),
            &mut StdRng::seed_from_u64(3),
        );
        assert!(matches!(result, Err(CalibrationError::NoCalibrants)));
    }

    #[test]
    fn test_results_csv_header() {
        let calibration = TravelingWaveCalibrator::new(DriftGas::Helium)
            .calibrate(&inputs()[..2], &reference(), &mut StdRng::seed_from_u64(4))
            .unwrap();
        let mut buffer = Vec::new();
        calibration.write_results_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("protein,mass,charge state,drift time,r2,calibrant_value\n"));
        assert_eq!(text.lines().count(), 3);
    }
}
