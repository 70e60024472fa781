//! Benchmarks for the state-variable filter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::dsp::filter::{FilterType, SVFilter};

use crate::BLOCK_SIZES;

const SAMPLE_RATE: f32 = 48_000.0;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp)
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        for filter_type in [FilterType::LowPass, FilterType::HighPass, FilterType::AllPass] {
            let mut filter = SVFilter::new(filter_type);
            let name = format!("{filter_type:?}").to_lowercase();
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut sum = 0.0f32;
                    for &sample in &input {
                        sum += filter.process(black_box(sample), 1_000.0, 0.7, SAMPLE_RATE);
                    }
                    sum
                })
            });
        }

        // Swept cutoff: coefficients recomputed every sample
        let mut filter = SVFilter::new(FilterType::LowPass);
        group.bench_with_input(BenchmarkId::new("swept_cutoff", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for (i, &sample) in input.iter().enumerate() {
                    let cutoff = 500.0 + i as f32 * 10.0;
                    sum += filter.process(black_box(sample), cutoff, 0.7, SAMPLE_RATE);
                }
                sum
            })
        });
    }

    group.finish();
}
