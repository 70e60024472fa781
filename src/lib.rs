pub mod dsp;
pub mod effects; // Effect units and the ordered effect chain
pub mod error;
pub mod graph; // Node arena, parameter timelines and block rendering
pub mod io;
pub mod synth; // Voices, envelopes, LFOs and the synth facade

pub use error::{Error, Result};

/// Largest block the binary hands to `render` in one call.
pub const MAX_BLOCK_SIZE: usize = 2048;
/// Frames processed per graph pass. Automation is evaluated per sample,
/// topology and k-rate parameters per quantum.
pub const RENDER_QUANTUM: usize = 128;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
