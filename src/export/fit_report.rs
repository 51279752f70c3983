//! Parameter tables, JSON summaries and sampled curves of composite fits.

use std::io::Write;

use serde::Serialize;

use crate::fitting::{CompositeFit, CURVE_POINTS};

use super::ExportError;

/// One component in the JSON summary
#[derive(Debug, Clone, Serialize)]
pub struct ComponentParameters {
    /// 1-based component index
    pub gaussian: usize,
    /// Peak height
    pub amplitude: f64,
    /// Peak position (Å²)
    pub center: f64,
    /// Standard deviation (Å²)
    pub width: f64,
}

/// JSON summary of one composite fit
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    /// Dataset label, e.g. `charge_7` or `summed`
    pub data_label: String,
    /// Number of components
    pub n_gaussians: usize,
    /// R² against the fitted points
    pub r_squared: f64,
    /// RMSE against the fitted points
    pub rmse: f64,
    /// Component parameters
    pub parameters: Vec<ComponentParameters>,
}

impl FitSummary {
    /// Build the summary of `fit`
    pub fn new(data_label: impl Into<String>, fit: &CompositeFit) -> Self {
        Self {
            data_label: data_label.into(),
            n_gaussians: fit.n_components(),
            r_squared: fit.r_squared,
            rmse: fit.rmse,
            parameters: fit
                .components
                .iter()
                .enumerate()
                .map(|(i, c)| ComponentParameters {
                    gaussian: i + 1,
                    amplitude: c.amplitude,
                    center: c.center,
                    width: c.width,
                })
                .collect(),
        }
    }
}

/// Write `Gaussian_index,Amplitude,Center,Width,R²,RMSE`, one row per component
pub fn write_parameters_csv<W: Write>(writer: W, fit: &CompositeFit) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["Gaussian_index", "Amplitude", "Center", "Width", "R²", "RMSE"])?;
    for (i, c) in fit.components.iter().enumerate() {
        csv.write_record([
            (i + 1).to_string(),
            c.amplitude.to_string(),
            c.center.to_string(),
            c.width.to_string(),
            fit.r_squared.to_string(),
            fit.rmse.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the pretty-printed JSON summary
pub fn write_parameters_json<W: Write>(
    writer: W,
    data_label: &str,
    fit: &CompositeFit,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, &FitSummary::new(data_label, fit))?;
    Ok(())
}

/// Write the model sampled over `[lo, hi]` as `CCS,Fitted_Intensity,Gaussian_1..N`
pub fn write_curve_csv<W: Write>(
    writer: W,
    fit: &CompositeFit,
    lo: f64,
    hi: f64,
) -> Result<usize, ExportError> {
    let curve = fit.curve(lo, hi, CURVE_POINTS);
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["CCS".to_string(), "Fitted_Intensity".to_string()];
    header.extend((1..=fit.n_components()).map(|i| format!("Gaussian_{i}")));
    csv.write_record(&header)?;

    for (i, (x, total)) in curve.ccs.iter().zip(&curve.total).enumerate() {
        let mut record = vec![x.to_string(), total.to_string()];
        record.extend(curve.components.iter().map(|c| c[i].to_string()));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(curve.ccs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::{FitOutcome, GaussianComponent};

    fn fit() -> CompositeFit {
        CompositeFit {
            components: vec![
                GaussianComponent::new(100.0, 1000.0, 20.0),
                GaussianComponent::new(50.0, 1100.0, 10.0),
            ],
            r_squared: 0.99,
            rmse: 1.5,
            outcome: FitOutcome::Fitted { iterations: 12 },
        }
    }

    #[test]
    fn test_parameters_csv() {
        let mut buffer = Vec::new();
        write_parameters_csv(&mut buffer, &fit()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Gaussian_index,Amplitude,Center,Width,R²,RMSE");
        assert_eq!(lines[2], "2,50,1100,10,0.99,1.5");
    }

    #[test]
    fn test_parameters_json() {
        let mut buffer = Vec::new();
        write_parameters_json(&mut buffer, "charge_7", &fit()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["data_label"], "charge_7");
        assert_eq!(value["n_gaussians"], 2);
        assert_eq!(value["parameters"][1]["gaussian"], 2);
        assert_eq!(value["parameters"][0]["center"], 1000.0);
    }

    #[test]
    fn test_curve_csv_shape() {
        let mut buffer = Vec::new();
        let rows = write_curve_csv(&mut buffer, &fit(), 900.0, 1200.0).unwrap();
        assert_eq!(rows, CURVE_POINTS);
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("CCS,Fitted_Intensity,Gaussian_1,Gaussian_2")
        );
        assert_eq!(text.lines().count(), CURVE_POINTS + 1);
    }
}
