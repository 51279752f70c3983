//! Linear drift-tube calibration using the Mason–Schamp equation.
//!
//! Apex drift times recorded at several drift voltages lie on a line
//! `t = t0 + td / V`. The intercept `t0` is the time spent outside the drift
//! region; the corrected drift time `t - t0` gives the mobility
//! `K = L² / (V · (t - t0))`, from which the CCS follows analytically.

use log::{debug, info, warn};
use serde::Serialize;

use super::reference::DriftGas;
use super::CalibrationError;
use crate::fitting::r_squared;
use crate::report::{SkipReason, SkippedItem};
use crate::series::ArrivalTimeSeries;

/// Elementary charge (C)
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
/// Boltzmann constant (J/K)
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Unified atomic mass unit (kg)
pub const DALTON: f64 = 1.660_539_066_60e-27;
/// Square metres to square ångström
pub const M2_TO_A2: f64 = 1e20;

/// DC voltages of one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageSettings {
    /// Drift cell DC (V)
    pub cell_dc: f64,
    /// Bias (V)
    pub bias: f64,
    /// Transfer DC entrance (V)
    pub transfer_dc_entrance: f64,
    /// Exit DC (V)
    pub exit_dc: f64,
}

impl VoltageSettings {
    /// Voltage actually dropped across the drift region
    pub fn true_voltage(&self) -> f64 {
        (self.cell_dc + self.bias) - (self.transfer_dc_entrance + self.exit_dc)
    }
}

/// Drift cell conditions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellConditions {
    /// Buffer gas pressure (Pa)
    pub pressure_pa: f64,
    /// Buffer gas temperature (K)
    pub temperature_k: f64,
    /// Drift region length (m)
    pub length_m: f64,
    /// Buffer gas mass (Da)
    pub gas_mass_da: f64,
}

impl CellConditions {
    /// Conditions with the buffer gas mass taken from `gas`
    pub fn new(gas: DriftGas, pressure_pa: f64, temperature_k: f64, length_m: f64) -> Self {
        Self {
            pressure_pa,
            temperature_k,
            length_m,
            gas_mass_da: gas.mass_da(),
        }
    }

    /// Buffer gas number density (m⁻³)
    pub fn number_density(&self) -> f64 {
        self.pressure_pa / (BOLTZMANN * self.temperature_k)
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        for (name, value) in [
            ("pressure", self.pressure_pa),
            ("temperature", self.temperature_k),
            ("length", self.length_m),
            ("gas mass", self.gas_mass_da),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CalibrationError::InvalidConditions(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// The ion being measured
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalyteIon {
    /// Mass (Da)
    pub mass_da: f64,
    /// Charge state
    pub charge: u32,
}

/// CCS in Å² from a mobility `k` (m²/(V·s)) via the Mason–Schamp equation
pub fn ccs_from_mobility(k: f64, ion: &AnalyteIon, conditions: &CellConditions) -> f64 {
    let reduced_mass = (ion.mass_da * conditions.gas_mass_da)
        / (ion.mass_da + conditions.gas_mass_da)
        * DALTON;
    let thermal = (2.0 * std::f64::consts::PI
        / (reduced_mass * BOLTZMANN * conditions.temperature_k))
        .sqrt();
    let prefactor =
        3.0 * ELEMENTARY_CHARGE * ion.charge as f64 / (16.0 * conditions.number_density());
    prefactor * thermal / k * M2_TO_A2
}

/// Least-squares line `y = slope · x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    /// Slope
    pub slope: f64,
    /// Intercept
    pub intercept: f64,
    /// Coefficient of determination
    pub r_squared: f64,
}

impl LinearFit {
    /// Ordinary least squares; `None` when all `x` are equal or fewer than 2 points
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len().min(y.len());
        if n < 2 {
            return None;
        }
        let mean_x = x[..n].iter().sum::<f64>() / n as f64;
        let mean_y = y[..n].iter().sum::<f64>() / n as f64;
        let sxx: f64 = x[..n].iter().map(|v| (v - mean_x).powi(2)).sum();
        if sxx == 0.0 {
            return None;
        }
        let sxy: f64 = x[..n]
            .iter()
            .zip(&y[..n])
            .map(|(a, b)| (a - mean_x) * (b - mean_y))
            .sum();
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let predicted: Vec<f64> = x[..n].iter().map(|v| slope * v + intercept).collect();
        Some(Self {
            slope,
            intercept,
            r_squared: r_squared(&y[..n], &predicted),
        })
    }

    /// Value of the line at `x`
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// One acquisition at a fixed drift voltage
#[derive(Debug, Clone)]
pub struct DriftTubeRun {
    /// Identifier used in outputs (usually the file name)
    pub label: String,
    /// Voltages of the acquisition
    pub voltages: VoltageSettings,
    /// Arrival time distribution (ms)
    pub series: ArrivalTimeSeries,
}

/// Apex of one run used in the line fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApexPoint {
    /// Run identifier
    pub label: String,
    /// True drift voltage (V)
    pub true_voltage: f64,
    /// Drift time of the most intense sample (ms)
    pub apex_time: f64,
}

/// One sample converted to CCS
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriftTubeRow {
    /// Recorded drift time (ms)
    pub drift_time: f64,
    /// CCS (Å²)
    pub ccs: f64,
    /// Recorded intensity
    pub intensity: f64,
}

/// Every convertible sample of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftTubeTable {
    /// Run identifier
    pub label: String,
    /// True drift voltage (V)
    pub true_voltage: f64,
    /// Converted samples in drift time order
    pub rows: Vec<DriftTubeRow>,
}

/// Fitted drift-tube calibration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftTubeCalibration {
    /// Dead time outside the drift region (ms)
    pub t0: f64,
    /// Slope of apex time against 1/V (ms·V)
    pub td: f64,
    /// R² of the line fit
    pub r_squared: f64,
    /// Apexes the line was fitted to
    pub apexes: Vec<ApexPoint>,
    /// Cell conditions
    pub conditions: CellConditions,
    /// Analyte ion
    pub ion: AnalyteIon,
}

impl DriftTubeCalibration {
    /// Mobility (m²/(V·s)) for a recorded drift time at `true_voltage`.
    ///
    /// `None` when the sample arrives no later than `t0` or the voltage is not positive.
    pub fn mobility(&self, drift_ms: f64, true_voltage: f64) -> Option<f64> {
        let corrected_s = (drift_ms - self.t0) * 1e-3;
        if corrected_s <= 0.0 || true_voltage <= 0.0 {
            return None;
        }
        Some(self.conditions.length_m.powi(2) / (true_voltage * corrected_s))
    }

    /// CCS (Å²) for a recorded drift time at `true_voltage`
    pub fn ccs(&self, drift_ms: f64, true_voltage: f64) -> Option<f64> {
        self.mobility(drift_ms, true_voltage)
            .map(|k| ccs_from_mobility(k, &self.ion, &self.conditions))
    }

    /// Convert every sample of `run`; samples before `t0` are left out
    pub fn ccs_table(&self, run: &DriftTubeRun) -> Result<DriftTubeTable, SkippedItem> {
        let voltage = run.voltages.true_voltage();
        if voltage <= 0.0 {
            return Err(SkippedItem::new(
                run.label.clone(),
                SkipReason::OutOfRange(format!("true voltage {voltage} V")),
            ));
        }
        let rows: Vec<DriftTubeRow> = run
            .series
            .iter()
            .filter_map(|(t, intensity)| {
                self.ccs(t, voltage).map(|ccs| DriftTubeRow {
                    drift_time: t,
                    ccs,
                    intensity,
                })
            })
            .collect();
        let dropped = run.series.len() - rows.len();
        if dropped > 0 {
            debug!("{}: {dropped} sample(s) arrive before t0", run.label);
        }
        Ok(DriftTubeTable {
            label: run.label.clone(),
            true_voltage: voltage,
            rows,
        })
    }

    /// Dense tables for all runs plus the runs that could not be converted
    pub fn ccs_tables(&self, runs: &[DriftTubeRun]) -> (Vec<DriftTubeTable>, Vec<SkippedItem>) {
        let mut tables = Vec::new();
        let mut skipped = Vec::new();
        for run in runs {
            match self.ccs_table(run) {
                Ok(table) => tables.push(table),
                Err(item) => {
                    warn!("Skipping {}", item);
                    skipped.push(item);
                }
            }
        }
        (tables, skipped)
    }
}

/// Builds drift-tube calibrations
#[derive(Debug, Clone)]
pub struct DriftTubeCalibrator {
    conditions: CellConditions,
    ion: AnalyteIon,
}

impl DriftTubeCalibrator {
    /// Calibrator for `ion` measured under `conditions`
    pub fn new(conditions: CellConditions, ion: AnalyteIon) -> Self {
        Self { conditions, ion }
    }

    /// Fit apex drift time against 1/V across all runs.
    ///
    /// A poor R² is reported, not rejected.
    pub fn calibrate(&self, runs: &[DriftTubeRun]) -> Result<DriftTubeCalibration, CalibrationError> {
        self.conditions.validate()?;
        if !(self.ion.mass_da.is_finite() && self.ion.mass_da > 0.0) || self.ion.charge == 0 {
            return Err(CalibrationError::InvalidConditions(format!(
                "analyte mass {} Da and charge {} must be positive",
                self.ion.mass_da, self.ion.charge
            )));
        }

        let mut apexes = Vec::with_capacity(runs.len());
        for run in runs {
            let voltage = run.voltages.true_voltage();
            if !(voltage.is_finite() && voltage > 0.0) {
                return Err(CalibrationError::InvalidConditions(format!(
                    "{}: true voltage {voltage} V is not positive",
                    run.label
                )));
            }
            apexes.push(ApexPoint {
                label: run.label.clone(),
                true_voltage: voltage,
                apex_time: run.series.apex_time(),
            });
        }

        let inverse: Vec<f64> = apexes.iter().map(|a| 1.0 / a.true_voltage).collect();
        let times: Vec<f64> = apexes.iter().map(|a| a.apex_time).collect();

        let mut distinct = inverse.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(CalibrationError::InsufficientVoltages {
                required: 2,
                got: distinct.len(),
            });
        }

        let line = LinearFit::fit(&inverse, &times).ok_or(CalibrationError::InsufficientVoltages {
            required: 2,
            got: distinct.len(),
        })?;
        info!(
            "Drift-tube fit: t0 = {:.4} ms, td = {:.4} ms·V, R² = {:.6}",
            line.intercept, line.slope, line.r_squared
        );

        Ok(DriftTubeCalibration {
            t0: line.intercept,
            td: line.slope,
            r_squared: line.r_squared,
            apexes,
            conditions: self.conditions,
            ion: self.ion,
        })
    }
}
