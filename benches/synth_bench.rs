//! Benchmarks for DSP primitives and full synth scenarios.
//!
//! Run with: cargo bench
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - dsp/*        Primitives the graph nodes are built on
//!   - scenarios/*  Graph rendering with voices and the effects chain

use criterion::{criterion_group, criterion_main};

mod dsp;
mod scenarios;

/// Common buffer sizes used in audio applications.
pub const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

criterion_group!(
    benches,
    dsp::bench_filter,
    dsp::bench_convolution,
    dsp::bench_spectrum,
    scenarios::bench_voices,
    scenarios::bench_chain,
);
criterion_main!(benches);
