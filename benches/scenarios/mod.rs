//! Scenario benchmarks: the graph host driven the way the synth drives it.

mod chain;
mod voices;

pub use chain::bench_chain;
pub use voices::bench_voices;
