use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::collections::BTreeMap;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ccsfit::export::{write_curve_csv, write_parameters_csv, write_parameters_json};
use ccsfit::fitting::{
    CompositeFit, FitError, FitStore, FixedMask, GaussianComponent, MultiGaussianFitter,
    Parameter, MAX_COMPONENTS,
};
use ccsfit::report::{RunReport, SkipReason, SkippedItem};
use ccsfit::series::{summed_spectrum, CcsSpectrum, DEFAULT_GRID_POINTS};

use super::{ensure_dir, multi_gaussian_fitter, print_report, Config};

#[derive(Args, Debug)]
pub struct FitArgs {
    /// Mapped or scaled CCS CSV. `Scaled Intensity` is fitted when the
    /// column exists, `Intensity` otherwise
    #[arg(value_name = "CCS_CSV")]
    ccs_csv: PathBuf,

    /// Fit the `Intensity` column even when `Scaled Intensity` is present
    #[arg(long)]
    unscaled: bool,

    /// Number of Gaussian components (1-10)
    #[arg(short = 'n', long)]
    components: Option<usize>,

    /// Fit only this charge state
    #[arg(long, value_name = "Z", conflicts_with = "summed")]
    charge: Option<u32>,

    /// Sum all charge states onto a common CCS grid and fit the sum
    #[arg(long)]
    summed: bool,

    /// Hold a parameter fixed during a refit: `c2=1500`, `w1=25`, or `a3`
    /// to keep the auto-fitted value (a = amplitude, c = center, w = width)
    #[arg(long = "fix", value_name = "SPEC")]
    fixed: Vec<FixSpec>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// One `--fix` argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixSpec {
    /// 0-based component index
    pub component: usize,
    /// Which parameter
    pub parameter: Parameter,
    /// Replacement value; `None` keeps the current one
    pub value: Option<f64>,
}

impl FromStr for FixSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let code = chars.next().ok_or("empty fix specification")?;
        let parameter = Parameter::from_code(code)
            .ok_or_else(|| format!("unknown parameter '{code}' (expected a, c or w)"))?;
        let rest = chars.as_str();
        let (index, value) = match rest.split_once('=') {
            Some((index, value)) => (index, Some(value)),
            None => (rest, None),
        };
        let index: usize = index
            .trim()
            .parse()
            .map_err(|_| format!("invalid component index in '{s}'"))?;
        if index == 0 {
            return Err(format!("component indices start at 1 in '{s}'"));
        }
        let value = value
            .map(|v| v.trim().parse::<f64>())
            .transpose()
            .map_err(|_| format!("invalid value in '{s}'"))?;
        Ok(FixSpec {
            component: index - 1,
            parameter,
            value,
        })
    }
}

/// Reject `--fix` arguments that point past the last component
fn check_fix_specs(specs: &[FixSpec], n: usize) -> Result<()> {
    if let Some(spec) = specs.iter().find(|spec| spec.component >= n) {
        anyhow::bail!(
            "--fix refers to component {} but the fit has {n}",
            spec.component + 1
        );
    }
    Ok(())
}

/// Apply fix specifications to auto-fitted components
fn constrain(fit: &CompositeFit, specs: &[FixSpec]) -> (Vec<GaussianComponent>, FixedMask) {
    let mut components = fit.components.clone();
    let mut mask = FixedMask::all_free(components.len());
    for spec in specs {
        let Some(component) = components.get_mut(spec.component) else {
            continue;
        };
        if let Some(value) = spec.value {
            match spec.parameter {
                Parameter::Amplitude => component.amplitude = value,
                Parameter::Center => component.center = value,
                Parameter::Width => component.width = value,
            }
        }
        mask.fix(spec.component, spec.parameter);
    }
    (components, mask)
}

/// Columns of a mapped or scaled CCS table that the fitter reads
#[derive(Debug, Deserialize)]
struct FitInputRow {
    #[serde(rename = "Charge")]
    charge: u32,
    #[serde(rename = "CCS")]
    ccs: f64,
    #[serde(rename = "Intensity")]
    intensity: f64,
    #[serde(rename = "Scaled Intensity", default)]
    scaled: Option<f64>,
}

/// Per-charge spectra from a CCS table, and whether scaled intensities were used
fn spectra_by_charge<R: Read>(
    reader: R,
    prefer_scaled: bool,
) -> Result<(BTreeMap<u32, CcsSpectrum>, bool)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let scaled = prefer_scaled && reader.headers()?.iter().any(|h| h == "Scaled Intensity");

    let mut points: BTreeMap<u32, Vec<(f64, f64)>> = BTreeMap::new();
    for row in reader.deserialize() {
        let row: FitInputRow = row?;
        let intensity = match row.scaled {
            Some(value) if scaled => value,
            _ => row.intensity,
        };
        points
            .entry(row.charge)
            .or_default()
            .push((row.ccs, intensity));
    }
    let spectra: BTreeMap<u32, CcsSpectrum> = points
        .into_iter()
        .map(|(charge, pairs)| {
            CcsSpectrum::from_pairs(pairs)
                .map(|s| (charge, s.sorted()))
                .with_context(|| format!("Invalid spectrum for charge {charge}"))
        })
        .collect::<Result<_>>()?;
    Ok((spectra, scaled))
}

fn write_outputs(dir: &Path, label: &str, spectrum: &CcsSpectrum, fit: &CompositeFit) -> Result<()> {
    let create = |name: String| -> Result<File> {
        let path = dir.join(name);
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))
    };
    write_parameters_csv(create(format!("{label}_parameters.csv"))?, fit)?;
    write_parameters_json(create(format!("{label}_parameters.json"))?, label, fit)?;
    if let Some((lo, hi)) = spectrum.domain() {
        write_curve_csv(create(format!("{label}_curve.csv"))?, fit, lo, hi)?;
    }
    Ok(())
}

fn fit_one(
    fitter: &MultiGaussianFitter,
    spectrum: &CcsSpectrum,
    n: usize,
    fixed: &[FixSpec],
) -> Result<CompositeFit, FitError> {
    let fit = fitter.auto_fit(spectrum, n);
    if fixed.is_empty() {
        return Ok(fit);
    }
    let (components, mask) = constrain(&fit, fixed);
    fitter.refit(spectrum, &components, &mask)
}

/// Fit every dataset. A failed refit skips its dataset and the rest still run.
fn fit_datasets(
    fitter: &MultiGaussianFitter,
    datasets: &[(String, CcsSpectrum)],
    n: usize,
    fixed: &[FixSpec],
) -> (FitStore<String>, Vec<SkippedItem>) {
    let mut store = FitStore::new();
    let mut skipped = Vec::new();
    for (label, spectrum) in datasets {
        match fit_one(fitter, spectrum, n, fixed) {
            Ok(fit) => {
                if !fit.outcome.is_fitted() {
                    warn!("{label}: {:?}", fit.outcome);
                }
                info!("{label}: R² {:.4}, RMSE {:.4}", fit.r_squared, fit.rmse);
                store.upsert(label.clone(), fit);
            }
            Err(e) => {
                let item = SkippedItem::new(label.clone(), SkipReason::FitFailed(e.to_string()));
                warn!("Skipping {item}");
                skipped.push(item);
            }
        }
    }
    (store, skipped)
}

pub fn run(args: FitArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let n = args.components.or(config.fitting.components).unwrap_or(1);
    if !(1..=MAX_COMPONENTS).contains(&n) {
        anyhow::bail!("Number of components must be between 1 and {MAX_COMPONENTS}, got {n}");
    }
    check_fix_specs(&args.fixed, n)?;
    let fitter = multi_gaussian_fitter(&config.fitting);

    let file = File::open(&args.ccs_csv)
        .with_context(|| format!("Failed to open CCS file: {}", args.ccs_csv.display()))?;
    let (spectra, scaled) = spectra_by_charge(file, !args.unscaled)
        .with_context(|| format!("Failed to parse CCS file: {}", args.ccs_csv.display()))?;
    if spectra.is_empty() {
        anyhow::bail!("No data in {}", args.ccs_csv.display());
    }

    let mut datasets: Vec<(String, CcsSpectrum)> = Vec::new();
    if args.summed {
        let all: Vec<CcsSpectrum> = spectra.into_values().collect();
        datasets.push(("summed".to_string(), summed_spectrum(&all, DEFAULT_GRID_POINTS)));
    } else if let Some(charge) = args.charge {
        let spectrum = spectra
            .get(&charge)
            .with_context(|| format!("Charge state {charge} not found in {}", args.ccs_csv.display()))?;
        datasets.push((format!("charge_{charge}"), spectrum.clone()));
    } else {
        datasets.extend(
            spectra
                .into_iter()
                .map(|(charge, spectrum)| (format!("charge_{charge}"), spectrum)),
        );
    }

    let (store, skipped) = fit_datasets(&fitter, &datasets, n, &args.fixed);
    ensure_dir(&args.output)?;
    for (label, spectrum) in &datasets {
        if let Some(fit) = store.get(label) {
            write_outputs(&args.output, label, spectrum, fit)?;
        }
    }

    let mut report = RunReport::new("Gaussian Fitting");
    report.processed = store.len();
    report.extend_skipped(skipped);
    report.detail("Components", n);
    report.detail(
        "Intensity column",
        if scaled { "Scaled Intensity" } else { "Intensity" },
    );
    for (label, fit) in store.iter() {
        report.detail(
            label.as_str(),
            format!("R² {:.4}, RMSE {:.4}", fit.r_squared, fit.rmse),
        );
    }
    report.detail("Output", args.output.display());
    print_report(&report);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccsfit::fitting::{gaussian, FitOutcome};

    #[test]
    fn test_parse_fix_specs() {
        assert_eq!(
            "c2=1500".parse::<FixSpec>().unwrap(),
            FixSpec {
                component: 1,
                parameter: Parameter::Center,
                value: Some(1500.0),
            }
        );
        assert_eq!(
            "w1".parse::<FixSpec>().unwrap(),
            FixSpec {
                component: 0,
                parameter: Parameter::Width,
                value: None,
            }
        );
        assert!("x1".parse::<FixSpec>().is_err());
        assert!("a0".parse::<FixSpec>().is_err());
        assert!("a1=abc".parse::<FixSpec>().is_err());
        assert!("".parse::<FixSpec>().is_err());
    }

    #[test]
    fn test_constrain_sets_values_and_mask() {
        let fit = CompositeFit {
            components: vec![
                GaussianComponent::new(10.0, 1000.0, 20.0),
                GaussianComponent::new(5.0, 1200.0, 30.0),
            ],
            r_squared: 0.9,
            rmse: 1.0,
            outcome: FitOutcome::Fitted { iterations: 3 },
        };
        let specs: [FixSpec; 2] = ["c2=1150".parse().unwrap(), "w1".parse().unwrap()];
        let (components, mask) = constrain(&fit, &specs);
        assert_eq!(components[1].center, 1150.0);
        assert_eq!(components[0].width, 20.0);
        assert_eq!(mask.free_indices(), vec![0, 1, 3, 5]);

        let out_of_range: [FixSpec; 1] = ["c3".parse().unwrap()];
        assert!(check_fix_specs(&out_of_range, 2).is_err());
        assert!(check_fix_specs(&specs, 2).is_ok());
    }

    fn gaussian_spectrum(center: f64) -> CcsSpectrum {
        let ccs: Vec<f64> = (0..200).map(|i| 900.0 + i as f64 * 2.0).collect();
        let intensity = ccs
            .iter()
            .map(|&x| gaussian(x, 100.0, center, 25.0))
            .collect();
        CcsSpectrum::new(ccs, intensity).unwrap()
    }

    #[test]
    fn test_failed_refit_skips_only_that_dataset() {
        // Two positive points cannot support a refit
        let sparse = CcsSpectrum::new(vec![1000.0, 1010.0, 1020.0], vec![5.0, 8.0, 0.0]).unwrap();
        let datasets = vec![
            ("charge_2".to_string(), sparse),
            ("charge_3".to_string(), gaussian_spectrum(1100.0)),
        ];
        let fixed: [FixSpec; 1] = ["c1".parse().unwrap()];

        let (store, skipped) =
            fit_datasets(&MultiGaussianFitter::default(), &datasets, 1, &fixed);

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].label, "charge_2");
        assert!(matches!(skipped[0].reason, SkipReason::FitFailed(_)));
        assert_eq!(store.len(), 1);
        assert!(store.get(&"charge_3".to_string()).is_some());
    }

    const SCALED_CSV: &str = "\
Charge,Drift,CCS,CCS Std.Dev.,Intensity,Scale Factor,Normalized Intensity,Scaled Intensity
5,0.004,1400,10,50,2,0.5,1
5,0.005,1500,10,100,2,1,2
6,0.004,1450,10,40,4,1,4
";

    #[test]
    fn test_scaled_intensity_preferred() {
        let (spectra, scaled) = spectra_by_charge(SCALED_CSV.as_bytes(), true).unwrap();
        assert!(scaled);
        assert_eq!(spectra[&5].intensity(), &[1.0, 2.0]);
        assert_eq!(spectra[&6].intensity(), &[4.0]);

        let (spectra, scaled) = spectra_by_charge(SCALED_CSV.as_bytes(), false).unwrap();
        assert!(!scaled);
        assert_eq!(spectra[&5].intensity(), &[50.0, 100.0]);
    }

    #[test]
    fn test_mapped_table_uses_intensity() {
        let csv = "Charge,Drift,CCS,CCS Std.Dev.,Intensity\n5,0.004,1400,10,50\n5,0.005,1500,10,100\n";
        let (spectra, scaled) = spectra_by_charge(csv.as_bytes(), true).unwrap();
        assert!(!scaled);
        assert_eq!(spectra[&5].ccs(), &[1400.0, 1500.0]);
        assert_eq!(spectra[&5].intensity(), &[50.0, 100.0]);
    }
}
