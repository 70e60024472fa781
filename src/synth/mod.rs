// Purpose: Voice allocation, envelopes, modulation and the synth facade
// This layer sits above the graph and decides which nodes exist per note

pub mod config;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod keymap;
pub mod lfo;
pub mod message;
pub mod oscillator;
pub mod voice;

pub use config::{ParamTarget, ParamValue, SynthConfig};
pub use engine::{SpectrumSnapshot, Synth, DEFAULT_VELOCITY};
pub use envelope::{EnvelopeConfig, EnvelopeScheduler};
pub use filter::{FilterConfig, FilterInstance, FilterStage};
pub use keymap::KeyMap;
pub use lfo::{Lfo, LfoBank, LfoConfig, ModulationRouting};
#[cfg(feature = "rtrb")]
pub use message::SynthHandle;
pub use message::{MessageReceiver, SynthMessage};
pub use oscillator::{OscillatorBank, OscillatorConfig, OscillatorInstance};
pub use voice::{Voice, VoiceManager, VoiceMode, VoiceModulation};
