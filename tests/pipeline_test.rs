//! Integration tests for ccsfit
//!
//! These tests run the file-based pipelines: raw ATD folders through
//! calibration, mapping, export and fitting.

use std::fs::{self, File};
use std::path::Path;

use ccsfit::calibration::{
    AnalyteIon, CalibrantInput, CalibrationTable, CellConditions, DriftGas, DriftTubeCalibrator,
    DriftTubeRun, ReferenceTable, TravelingWaveCalibrator, VoltageSettings,
};
use ccsfit::export::{
    write_ccs_rows, write_curve_csv, write_drift_tube_table, write_parameters_csv, RunMetadata,
    SpectrumWriter, SpectrumWriterConfig, KEY_RUN_METADATA,
};
use ccsfit::fitting::{gaussian, FitOutcome, MultiGaussianFitter, CURVE_POINTS};
use ccsfit::input::{raw_series_files, read_arrival_series_file};
use ccsfit::mapping::{CcsMapper, CcsRow, MapperConfig, MappingInput};
use ccsfit::report::SkipReason;
use ccsfit::series::{ArrivalTimeSeries, CcsSpectrum};
use parquet::file::reader::{FileReader, SerializedFileReader};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

/// Write a Gaussian ATD sampled every 0.1 ms as a two-column text file
fn write_atd(path: &Path, center: f64) {
    let mut text = String::from("# drift_ms intensity\n");
    for i in 1..=200 {
        let t = i as f64 * 0.1;
        text.push_str(&format!("{t}\t{}\n", gaussian(t, 1000.0, center, 0.5)));
    }
    fs::write(path, text).unwrap();
}

fn raw_folder(root: &Path) {
    let ubq = root.join("ubq");
    fs::create_dir_all(&ubq).unwrap();
    write_atd(&ubq.join("6.txt"), 4.5);
    write_atd(&ubq.join("7.txt"), 3.8);
    fs::write(ubq.join("notes.md"), "not a charge state").unwrap();
}

const CALIBRATION_CSV: &str = "Z,Drift,CCS,CCS Std.Dev.\n\
                               6,0.004,1500,10\n\
                               6,0.005,1550,12\n\
                               6,0.006,1600,400\n";

/// Raw folder to mapped CSV and Parquet store
#[test]
fn test_map_pipeline() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("raw");
    raw_folder(&raw);

    let mut table = CalibrationTable::new();
    table.read_csv("ubq", CALIBRATION_CSV.as_bytes()).unwrap();
    assert_eq!(table.len(), 3);

    let files = raw_series_files(&raw).unwrap();
    assert_eq!(files.len(), 2);
    let inputs: Vec<MappingInput> = files
        .into_iter()
        .map(|f| MappingInput {
            series: read_arrival_series_file(&f.path).unwrap(),
            analyte: f.analyte,
            charge: f.charge,
        })
        .collect();

    let mapper = CcsMapper::new(&table, MapperConfig::default());
    let batch = mapper.map_all(&inputs);

    // Entry with CCS Std.Dev. 400 > 0.1 × 1600 is dropped
    assert_eq!(batch.spectra.len(), 1);
    let mapped = &batch.spectra[0];
    assert_eq!(mapped.charge, 6);
    assert_eq!(mapped.rows.len(), 2);
    assert_eq!(mapped.rows[0].ccs, 1500.0);
    assert!(mapped.rows.iter().all(|r| r.intensity > 0.0));

    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(batch.skipped[0].label, "ubq_7");
    assert_eq!(batch.skipped[0].reason, SkipReason::NoCalibration);

    // CSV written and read back
    let csv_path = dir.path().join("ubq_ccs.csv");
    write_ccs_rows(File::create(&csv_path).unwrap(), &mapped.rows).unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let rows: Vec<CcsRow> = reader.deserialize().map(Result::unwrap).collect();
    assert_eq!(rows, mapped.rows);

    // Parquet store: one row per mapped spectrum
    let parquet_path = dir.path().join("ccs_spectra.parquet");
    let metadata = RunMetadata::new(0.1, 0.0).with_calibration_files(vec!["ubq.csv".into()]);
    let mut writer =
        SpectrumWriter::new_file(&parquet_path, &metadata, SpectrumWriterConfig::default()).unwrap();
    writer.write_spectra(&batch.spectra).unwrap();
    let stats = writer.finish().unwrap();
    assert_eq!(stats.spectra_written, 1);
    assert_eq!(stats.data_points_written, 2);

    let reader = SerializedFileReader::new(File::open(&parquet_path).unwrap()).unwrap();
    let file_metadata = reader.metadata().file_metadata();
    assert_eq!(file_metadata.num_rows(), 1);
    let kv = file_metadata.key_value_metadata().unwrap();
    assert!(kv.iter().any(|kv| kv.key == KEY_RUN_METADATA));
}

/// Injection time shifts which raw sample a calibration entry lands on
#[test]
fn test_map_with_injection_time() {
    let series = ArrivalTimeSeries::new(
        vec![1.0, 2.0, 3.0, 4.0, 5.0],
        vec![10.0, 20.0, 30.0, 40.0, 50.0],
    )
    .unwrap();
    let mut table = CalibrationTable::new();
    table.read_csv("a", "Z,Drift,CCS,CCS Std.Dev.\n2,0.002,800,1\n".as_bytes()).unwrap();

    let plain = CcsMapper::new(&table, MapperConfig::default());
    assert_eq!(plain.map("a", 2, &series).unwrap().rows[0].intensity, 20.0);

    let cyclic = CcsMapper::new(
        &table,
        MapperConfig {
            injection_ms: 1.0,
            ..MapperConfig::default()
        },
    );
    assert_eq!(cyclic.map("a", 2, &series).unwrap().rows[0].intensity, 30.0);
}

/// Calibrant ATDs on disk against a reference CSV on disk
#[test]
fn test_twim_calibration_from_files() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("calibrants");
    fs::create_dir_all(raw.join("ubiquitin")).unwrap();
    write_atd(&raw.join("ubiquitin").join("6.txt"), 4.0);
    write_atd(&raw.join("ubiquitin").join("7.txt"), 3.5);

    let reference_path = dir.path().join("reference.csv");
    fs::write(
        &reference_path,
        "protein,mass,charge,CCS_he,CCS_n2\nubiquitin,8565,6,15.0,\n",
    )
    .unwrap();
    let reference = ReferenceTable::from_path(&reference_path).unwrap();

    let inputs: Vec<CalibrantInput> = raw_series_files(&raw)
        .unwrap()
        .into_iter()
        .map(|f| CalibrantInput {
            series: read_arrival_series_file(&f.path).unwrap(),
            analyte: f.analyte,
            charge: f.charge,
        })
        .collect();

    let calibration = TravelingWaveCalibrator::new(DriftGas::Helium)
        .calibrate(&inputs, &reference, &mut StdRng::seed_from_u64(7))
        .unwrap();

    assert_eq!(calibration.points.len(), 1);
    assert!((calibration.points[0].drift_time - 4.0).abs() < 0.01);
    assert!(calibration.points[0].r_squared > 0.99);
    assert_eq!(calibration.skipped.len(), 1);
    assert_eq!(calibration.skipped[0].reason, SkipReason::NotInReference);

    let reference_file = dir.path().join("calibration_data.dat");
    calibration
        .write_reference(File::create(&reference_file).unwrap())
        .unwrap();
    let text = fs::read_to_string(&reference_file).unwrap();
    assert_eq!(text.lines().count(), 5);
    assert!(text.lines().nth(4).unwrap().starts_with("ubiquitin_6 8565 6 1500 "));
}

/// Apexes placed exactly on t = t0 + td / V
#[test]
fn test_drift_tube_calibration() {
    let (t0, td) = (2.0, 400.0);
    let runs: Vec<DriftTubeRun> = [100.0, 200.0, 400.0, 800.0]
        .iter()
        .map(|&voltage| {
            let apex = t0 + td / voltage;
            let t: Vec<f64> = (1..=20).map(|i| i as f64 * 0.5).collect();
            let y = t.iter().map(|&x| gaussian(x, 100.0, apex, 0.6)).collect();
            DriftTubeRun {
                label: format!("run_{voltage}"),
                voltages: VoltageSettings {
                    cell_dc: voltage + 10.0,
                    bias: 5.0,
                    transfer_dc_entrance: 10.0,
                    exit_dc: 5.0,
                },
                series: ArrivalTimeSeries::new(t, y).unwrap(),
            }
        })
        .collect();

    let conditions = CellConditions::new(DriftGas::Helium, 400.0, 298.0, 0.25);
    let ion = AnalyteIon {
        mass_da: 8565.0,
        charge: 6,
    };
    let calibration = DriftTubeCalibrator::new(conditions, ion)
        .calibrate(&runs)
        .unwrap();

    assert!((calibration.t0 - t0).abs() < 1e-9);
    assert!((calibration.td - td).abs() < 1e-6);
    assert!(calibration.r_squared > 0.999_999);

    let (tables, skipped) = calibration.ccs_tables(&runs);
    assert!(skipped.is_empty());
    assert_eq!(tables.len(), 4);
    for (table, run) in tables.iter().zip(&runs) {
        // Samples at or before t0 carry no CCS
        let after_t0 = run
            .series
            .drift_time()
            .iter()
            .filter(|&&t| t > calibration.t0)
            .count();
        assert!(after_t0 >= 16);
        assert_eq!(table.rows.len(), after_t0);
        assert!(table.rows.windows(2).all(|w| w[1].ccs > w[0].ccs));
    }

    let mut buffer = Vec::new();
    write_drift_tube_table(&mut buffer, &tables[0]).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert!(text.starts_with("Drift Time,CCS,Intensity\n"));
    assert_eq!(text.lines().count(), tables[0].rows.len() + 1);
}

/// Two well separated conformers are recovered and exported
#[test]
fn test_fit_two_conformers() {
    let ccs: Vec<f64> = (0..400).map(|i| 1200.0 + i as f64 * 2.0).collect();
    let intensity = ccs
        .iter()
        .map(|&x| gaussian(x, 100.0, 1450.0, 25.0) + gaussian(x, 60.0, 1750.0, 30.0))
        .collect();
    let spectrum = CcsSpectrum::new(ccs, intensity).unwrap();

    let fit = MultiGaussianFitter::default().auto_fit(&spectrum, 2);
    assert!(matches!(fit.outcome, FitOutcome::Fitted { .. }));
    assert!(fit.r_squared > 0.999);

    let mut centers: Vec<f64> = fit.components.iter().map(|c| c.center).collect();
    centers.sort_by(f64::total_cmp);
    assert!((centers[0] - 1450.0).abs() < 1.0);
    assert!((centers[1] - 1750.0).abs() < 1.0);

    let mut parameters = Vec::new();
    write_parameters_csv(&mut parameters, &fit).unwrap();
    assert_eq!(String::from_utf8(parameters).unwrap().lines().count(), 3);

    let mut curve = Vec::new();
    let (lo, hi) = spectrum.domain().unwrap();
    let written = write_curve_csv(&mut curve, &fit, lo, hi).unwrap();
    assert_eq!(written, CURVE_POINTS);
    let text = String::from_utf8(curve).unwrap();
    assert!(text.starts_with("CCS,Fitted_Intensity,Gaussian_1,Gaussian_2\n"));
}
