use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ccsfit::fitting::{gaussian, MultiGaussianFitter, SinglePeakFitter};
use ccsfit::series::{summed_spectrum, ArrivalTimeSeries, CcsSpectrum, DEFAULT_GRID_POINTS};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Synthetic CCS spectrum with `n` evenly spaced conformers
fn conformer_spectrum(n: usize, points: usize) -> CcsSpectrum {
    let ccs: Vec<f64> = (0..points)
        .map(|i| 1000.0 + i as f64 * 1000.0 / points as f64)
        .collect();
    let centers: Vec<f64> = (0..n)
        .map(|k| 1000.0 + (k as f64 + 0.5) * 1000.0 / n as f64)
        .collect();
    let intensity = ccs
        .iter()
        .map(|&x| {
            centers
                .iter()
                .enumerate()
                .map(|(k, &c)| gaussian(x, 100.0 / (k + 1) as f64, c, 20.0))
                .sum::<f64>()
        })
        .collect();
    CcsSpectrum::new(ccs, intensity).unwrap()
}

fn calibrant_atd() -> ArrivalTimeSeries {
    let t: Vec<f64> = (1..=200).map(|i| i as f64 * 0.07).collect();
    let y = t.iter().map(|&x| gaussian(x, 800.0, 6.3, 0.45)).collect();
    ArrivalTimeSeries::new(t, y).unwrap()
}

/// Benchmark the composite fit for increasing component counts
fn bench_auto_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_fit");
    let fitter = MultiGaussianFitter::default();

    for n in [1usize, 3, 5] {
        let spectrum = conformer_spectrum(n, 500);
        group.throughput(Throughput::Elements(spectrum.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &spectrum, |b, spectrum| {
            b.iter(|| black_box(fitter.auto_fit(spectrum, n)));
        });
    }

    group.finish();
}

/// Benchmark the randomized single-peak fit of a calibrant ATD
fn bench_single_peak(c: &mut Criterion) {
    let series = calibrant_atd();
    let fitter = SinglePeakFitter::default();

    c.bench_function("single_peak_fit", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| black_box(fitter.fit_with_rng(&series, &mut rng)));
    });
}

/// Benchmark summing charge states onto a common grid
fn bench_summed_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("summed_spectrum");

    for charges in [2usize, 8, 16] {
        let spectra: Vec<CcsSpectrum> = (0..charges).map(|_| conformer_spectrum(2, 300)).collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(charges),
            &spectra,
            |b, spectra| {
                b.iter(|| black_box(summed_spectrum(spectra, DEFAULT_GRID_POINTS)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_auto_fit, bench_single_peak, bench_summed_spectrum);
criterion_main!(benches);
