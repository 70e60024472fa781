//! Benchmarks for low-level DSP primitives.

mod convolution;
mod filter;
mod spectrum;

pub use convolution::bench_convolution;
pub use filter::bench_filter;
pub use spectrum::bench_spectrum;
