//! Property-based tests for the numeric building blocks.

use ccsfit::calibration::{CalibrationEntry, CalibrationTable};
use ccsfit::fitting::{r_squared, rmse};
use ccsfit::mapping::{CcsMapper, MapperConfig};
use ccsfit::report::SkipReason;
use ccsfit::series::{linspace, nearest_position, sum_onto_grid, ArrivalTimeSeries, CcsSpectrum};
use proptest::prelude::*;

/// Spectrum with a strictly increasing CCS axis
fn spectrum_strategy() -> impl Strategy<Value = CcsSpectrum> {
    (
        500.0f64..1500.0,
        prop::collection::vec((0.5f64..10.0, 0.0f64..1000.0), 2..60),
    )
        .prop_map(|(start, steps)| {
            let mut x = start;
            let pairs: Vec<(f64, f64)> = steps
                .into_iter()
                .map(|(dx, y)| {
                    x += dx;
                    (x, y)
                })
                .collect();
            CcsSpectrum::from_pairs(pairs).unwrap()
        })
}

fn entry_strategy() -> impl Strategy<Value = CalibrationEntry> {
    (0.001f64..0.02, 500.0f64..2000.0, 0.0f64..400.0).prop_map(|(drift_time, ccs, ccs_stddev)| {
        CalibrationEntry {
            charge: 3,
            drift_time,
            ccs,
            ccs_stddev,
        }
    })
}

/// Entries for one charge state with strictly increasing drift times
fn distinct_entries_strategy() -> impl Strategy<Value = Vec<CalibrationEntry>> {
    prop::collection::vec((1e-5f64..1e-3, 500.0f64..2000.0, 0.0f64..300.0), 1..40).prop_map(
        |steps| {
            let mut drift_time = 0.001;
            steps
                .into_iter()
                .map(|(step, ccs, ccs_stddev)| {
                    drift_time += step;
                    CalibrationEntry {
                        charge: 4,
                        drift_time,
                        ccs,
                        ccs_stddev,
                    }
                })
                .collect()
        },
    )
}

proptest! {
    /// Summing a spectrum with itself doubles its interpolated intensities
    #[test]
    fn test_sum_of_identical_spectra(spectrum in spectrum_strategy(), points in 2usize..200) {
        let (lo, hi) = spectrum.domain().unwrap();
        let grid = linspace(lo - 50.0, hi + 50.0, points);
        let single = spectrum.interpolate(&grid);
        let summed = sum_onto_grid(&[spectrum.clone(), spectrum], &grid);

        prop_assert_eq!(summed.ccs(), grid.as_slice());
        for (s, y) in summed.intensity().iter().zip(&single) {
            prop_assert_eq!(*s, 2.0 * y);
        }
    }

    /// Grid points outside the CCS domain contribute nothing
    #[test]
    fn test_interpolation_is_zero_outside_domain(spectrum in spectrum_strategy(), offset in 0.1f64..500.0) {
        let (lo, hi) = spectrum.domain().unwrap();
        let values = spectrum.interpolate(&[lo - offset, hi + offset]);
        prop_assert_eq!(values, vec![0.0, 0.0]);
    }

    /// The nearest position is never farther from the target than any other value
    #[test]
    fn test_nearest_position_minimizes_distance(
        values in prop::collection::vec(-1000.0f64..1000.0, 1..50),
        target in -1200.0f64..1200.0,
    ) {
        let index = nearest_position(&values, target).unwrap();
        let best = (values[index] - target).abs();
        prop_assert!(values.iter().all(|v| (v - target).abs() >= best));
        prop_assert!(values[..index].iter().all(|v| (v - target).abs() > best));
    }

    /// One mapped row per calibration entry that passes the spread filter
    #[test]
    fn test_mapper_row_count(
        entries in prop::collection::vec(entry_strategy(), 1..30),
        max_relative_stddev in 0.01f64..0.3,
    ) {
        let mut table = CalibrationTable::new();
        for entry in &entries {
            table.insert("protein", *entry);
        }
        let t: Vec<f64> = (1..=300).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = t.iter().map(|x| x * 10.0).collect();
        let series = ArrivalTimeSeries::new(t, y).unwrap();

        let config = MapperConfig {
            max_relative_stddev,
            ..MapperConfig::default()
        };
        let mapper = CcsMapper::new(&table, config);
        let expected = entries
            .iter()
            .filter(|e| e.within_spread(max_relative_stddev))
            .count();

        match mapper.map("protein", 3, &series) {
            Ok(mapped) => {
                prop_assert_eq!(mapped.rows.len(), expected);
                prop_assert!(mapped
                    .rows
                    .iter()
                    .all(|r| r.ccs_stddev <= max_relative_stddev * r.ccs));
            }
            Err(item) => {
                prop_assert_eq!(expected, 0);
                prop_assert_eq!(item.reason, SkipReason::AllEntriesFiltered);
            }
        }
    }

    /// A perfect prediction has R² of 1 and no error
    #[test]
    fn test_perfect_prediction_scores(observed in prop::collection::vec(0.0f64..1000.0, 2..100)) {
        let mean = observed.iter().sum::<f64>() / observed.len() as f64;
        prop_assume!(observed.iter().any(|y| (y - mean).abs() > 1e-6));

        prop_assert_eq!(r_squared(&observed, &observed), 1.0);
        prop_assert_eq!(rmse(&observed, &observed), 0.0);
    }

    /// Looking a mapped row's drift time up in the mapper's table returns the row's CCS
    #[test]
    fn test_mapped_rows_match_table_lookup(entries in distinct_entries_strategy()) {
        let mut table = CalibrationTable::new();
        for entry in &entries {
            table.insert("protein", *entry);
        }
        let t: Vec<f64> = (1..=400).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = t.iter().map(|x| 100.0 - x).collect();
        let series = ArrivalTimeSeries::new(t, y).unwrap();

        let mapper = CcsMapper::new(&table, MapperConfig::default());
        if let Ok(mapped) = mapper.map("protein", 4, &series) {
            for row in &mapped.rows {
                prop_assert_eq!(
                    mapper.table().lookup_ccs("protein", 4, row.drift_time),
                    Some(row.ccs)
                );
            }
        }
        for entry in mapper.table().entries("protein", 4).unwrap_or_default() {
            prop_assert_eq!(
                mapper.table().lookup_ccs("protein", 4, entry.drift_time),
                Some(entry.ccs)
            );
        }
    }
}
