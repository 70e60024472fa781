// Purpose: Effect units and the ordered chain they are wired into
// Every unit owns a private subgraph behind one input and one output node

pub mod chorus;
pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod flanger;
pub mod manager;
pub mod phaser;
pub mod reverb;
pub mod spectrum;
pub mod tremolo;
pub mod unit;

pub use manager::{EffectCategory, EffectMetadata, EffectRegistration, EffectsManager};
pub use unit::{Effect, EffectConfig, EffectPorts, EffectUnit};

use chorus::Chorus;
use compressor::Compressor;
use delay::Delay;
use distortion::Distortion;
use flanger::Flanger;
use phaser::Phaser;
use reverb::Reverb;
use spectrum::SpectrumTap;
use tremolo::Tremolo;

/// The stock chain, in signal order: drive, dynamics, modulation, time,
/// space, then the analyser tap on the final mix.
pub fn default_effects() -> Vec<(Effect, EffectMetadata)> {
    vec![
        (
            Distortion::default().into(),
            EffectMetadata::new("distortion", "Distortion", 10, EffectCategory::Distortion),
        ),
        (
            Compressor::default().into(),
            EffectMetadata::new("compressor", "Compressor", 20, EffectCategory::Dynamics),
        ),
        (
            Chorus::default().into(),
            EffectMetadata::new("chorus", "Chorus", 30, EffectCategory::Modulation),
        ),
        (
            Flanger::default().into(),
            EffectMetadata::new("flanger", "Flanger", 40, EffectCategory::Modulation),
        ),
        (
            Phaser::default().into(),
            EffectMetadata::new("phaser", "Phaser", 50, EffectCategory::Modulation),
        ),
        (
            Tremolo::default().into(),
            EffectMetadata::new("tremolo", "Tremolo", 60, EffectCategory::Modulation),
        ),
        (
            Delay::default().into(),
            EffectMetadata::new("delay", "Delay", 70, EffectCategory::Time),
        ),
        (
            Reverb::default().into(),
            EffectMetadata::new("reverb", "Reverb", 80, EffectCategory::Space),
        ),
        (
            SpectrumTap::default().into(),
            EffectMetadata::new("spectrum", "Spectrum", 90, EffectCategory::Analysis),
        ),
    ]
}
