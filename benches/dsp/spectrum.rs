//! Benchmarks for the analyser tap.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::dsp::spectrum::Analyser;

pub fn bench_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/spectrum");

    for fft_size in [512usize, 2048, 8192] {
        let signal: Vec<f32> = (0..fft_size).map(|i| (i as f32 * 0.07).sin()).collect();
        let mut analyser = Analyser::new(fft_size, 0.8);
        analyser.push(&signal);

        group.bench_with_input(
            BenchmarkId::new("frequency_data", fft_size),
            &fft_size,
            |b, _| b.iter(|| black_box(analyser.frequency_data())),
        );
    }

    group.finish();
}
