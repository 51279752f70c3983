//! TOML configuration file support.
//!
//! Every command accepts `--config FILE`. Values in the file replace the
//! built-in defaults; flags given on the command line replace both:
//!
//! ```toml
//! # ccsfit.toml
//! [fitting]
//! attempts = 20
//! max_iter = 5000
//! components = 3
//! seed = 42
//!
//! [mapping]
//! max_relative_stddev = 0.05
//!
//! [scaling]
//! window = 0.02
//!
//! [calibration]
//! gas = "nitrogen"
//! velocity = 300.0
//! cyclic = true
//! inject_time_ms = 12.0
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure for ccsfit.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Peak fitting settings.
    #[serde(default)]
    pub fitting: FittingConfig,

    /// CCS mapping settings.
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Charge-state scaling settings.
    #[serde(default)]
    pub scaling: ScalingConfig,

    /// Calibration and instrument settings.
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// Settings shared by the single-peak and composite fitters.
#[derive(Debug, Default, Deserialize)]
pub struct FittingConfig {
    /// Random restarts per single-peak fit.
    pub attempts: Option<usize>,

    /// Solver iteration cap.
    pub max_iter: Option<usize>,

    /// Relative cost reduction that counts as converged.
    pub tolerance: Option<f64>,

    /// Default number of Gaussian components.
    pub components: Option<usize>,

    /// Smoothing applied before peak detection (samples).
    pub smoothing_sigma: Option<f64>,

    /// Seed for the multi-start draws.
    pub seed: Option<u64>,
}

/// Settings for applying calibration tables.
#[derive(Debug, Default, Deserialize)]
pub struct MappingConfig {
    /// Discard entries with CCS Std.Dev. above this fraction of CCS.
    pub max_relative_stddev: Option<f64>,

    /// Also write a Parquet file of the mapped spectra.
    pub parquet: Option<bool>,
}

/// Settings for relative charge-state scaling.
#[derive(Debug, Default, Deserialize)]
pub struct ScalingConfig {
    /// Half-width of the m/z integration window as a fraction of m/z.
    pub window: Option<f64>,

    /// Drop rows with CCS Std.Dev. at or above this fraction of CCS.
    pub max_relative_stddev: Option<f64>,
}

/// Instrument settings for calibration and drift time correction.
#[derive(Debug, Default, Deserialize)]
pub struct CalibrationConfig {
    /// Drift gas of the literature values (`helium` or `nitrogen`).
    pub gas: Option<String>,

    /// Wave velocity (m/s).
    pub velocity: Option<f64>,

    /// Wave height (V).
    pub wave_height: Option<f64>,

    /// Mobility cell pressure (mbar).
    pub pressure: Option<f64>,

    /// Mobility cell length (m).
    pub length: Option<f64>,

    /// Data was recorded on a cyclic instrument.
    pub cyclic: Option<bool>,

    /// Injection time to subtract on cyclic instruments (ms).
    pub inject_time_ms: Option<f64>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [fitting]
            attempts = 20
            max_iter = 5000
            components = 3
            seed = 42

            [mapping]
            max_relative_stddev = 0.05
            parquet = true

            [calibration]
            gas = "nitrogen"
            velocity = 300.0
            cyclic = true
            inject_time_ms = 12.5
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.fitting.attempts, Some(20));
        assert_eq!(config.fitting.max_iter, Some(5000));
        assert_eq!(config.fitting.components, Some(3));
        assert_eq!(config.fitting.seed, Some(42));
        assert_eq!(config.mapping.max_relative_stddev, Some(0.05));
        assert_eq!(config.mapping.parquet, Some(true));
        assert_eq!(config.calibration.gas.as_deref(), Some("nitrogen"));
        assert_eq!(config.calibration.velocity, Some(300.0));
        assert_eq!(config.calibration.cyclic, Some(true));
        assert_eq!(config.calibration.inject_time_ms, Some(12.5));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [mapping]
            max_relative_stddev = 0.2
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.mapping.max_relative_stddev, Some(0.2));
        assert_eq!(config.fitting.attempts, None);
        assert_eq!(config.calibration.gas, None);
    }

    #[test]
    fn test_scaling_section() {
        let toml = r#"
            [scaling]
            window = 0.02
            max_relative_stddev = 0.3
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.scaling.window, Some(0.02));
        assert_eq!(config.scaling.max_relative_stddev, Some(0.3));
        assert_eq!(config.mapping.max_relative_stddev, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.fitting.max_iter, None);
        assert_eq!(config.mapping.parquet, None);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_str("[fitting]\nattempts = \"many\"").is_err());
    }
}
