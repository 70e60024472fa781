//! Benchmarks for partitioned convolution with generated reverb tails.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::dsp::{convolution::Convolver, reverb::impulse_response};
use saavy_synth::RENDER_QUANTUM;

pub fn bench_convolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/convolution");
    let sample_rate = 48_000.0;

    let input: Vec<f32> = (0..RENDER_QUANTUM)
        .map(|i| {
            if i < 10 {
                1.0 - (i as f32 / 10.0) // Initial impulse
            } else {
                (i as f32 * 0.05).sin() * 0.1 // Quiet tail
            }
        })
        .collect();
    let mut output = vec![0.0f32; RENDER_QUANTUM];

    for seconds in [0.5f32, 2.0, 5.0] {
        let impulse = impulse_response(sample_rate, seconds, 3.0, 1);
        let mut convolver = Convolver::new(&impulse, RENDER_QUANTUM);
        let label = format!("{seconds}s_tail");
        group.bench_with_input(BenchmarkId::new(label, RENDER_QUANTUM), &seconds, |b, _| {
            b.iter(|| {
                convolver.process_block(black_box(&input), black_box(&mut output));
            })
        });
    }

    group.finish();
}
