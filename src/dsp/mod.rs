//! Low-level DSP primitives used by the graph nodes.
//!
//! These components hold only their own signal state. Parameter values are
//! passed in per sample (or per block) by the caller, which keeps them free
//! of any knowledge about automation or routing.

/// Uniformly-partitioned FFT convolution.
pub mod convolution;
/// Time-domain delay line with fractional reads.
pub mod delay;
/// Waveshaping transfer curves.
pub mod distortion;
/// Peak compressor with soft knee.
pub mod dynamics;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Oscillator waveforms and noise sources.
pub mod oscillator;
/// Procedural impulse responses for convolution reverb.
pub mod reverb;
/// Rolling FFT analysis for external polling.
pub mod spectrum;

pub use filter::FilterType;
pub use oscillator::Waveform;
