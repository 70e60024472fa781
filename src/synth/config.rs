use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{filter::FilterType, oscillator::Waveform},
    synth::{
        envelope::EnvelopeConfig,
        filter::FilterConfig,
        lfo::{LfoConfig, ModulationRouting},
        oscillator::OscillatorConfig,
        voice::VoiceMode,
    },
    Error, Result,
};

/// Everything needed to build a [`Synth`](super::Synth).
///
/// Plain data: reading it back from a running synth gives a snapshot of the
/// live values, and nothing here is persisted by the crate itself.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub sample_rate: f32,
    pub max_voices: usize,
    pub mode: VoiceMode,
    pub envelope: EnvelopeConfig,
    pub filter_envelope: EnvelopeConfig,
    pub filter: FilterConfig,
    pub oscillators: Vec<OscillatorConfig>,
    pub lfos: Vec<LfoConfig>,
    pub routing: ModulationRouting,
    pub master_gain: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_voices: 16,
            mode: VoiceMode::Poly,
            envelope: EnvelopeConfig::default(),
            filter_envelope: EnvelopeConfig::new(0.01, 0.3, 0.4, 0.4),
            filter: FilterConfig {
                filter_type: FilterType::LowPass,
                cutoff: 2_000.0,
                resonance: 1.0,
                env_amount: 2_500.0,
            },
            oscillators: vec![
                OscillatorConfig::new(Waveform::Sawtooth, -6.0, 0.5),
                OscillatorConfig::new(Waveform::Sawtooth, 6.0, 0.5),
            ],
            lfos: vec![LfoConfig::new("lfo1")],
            routing: ModulationRouting {
                filter: vec!["lfo1".into()],
                pitch: vec!["lfo1".into()],
            },
            master_gain: 0.8,
        }
    }
}

/// A named scalar or string value from a parameter provider.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f32),
    Text(String),
}

impl ParamValue {
    /// Numbers pass through; text is parsed. Non-finite values are refused.
    pub fn as_number(&self, name: &str) -> Result<f32> {
        let value = match self {
            ParamValue::Number(value) => *value,
            ParamValue::Text(text) => text
                .trim()
                .parse::<f32>()
                .map_err(|_| Error::invalid_value(name, format!("`{text}` is not a number")))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::invalid_value(name, "value must be finite"))
        }
    }

    pub fn as_text(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(text) => Ok(text),
            ParamValue::Number(_) => Err(Error::invalid_value(name, "expected text")),
        }
    }

    /// Parse text into an enum such as [`Waveform`] or [`FilterType`].
    pub fn parse<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr<Err = Error>,
    {
        self.as_text(name)?.parse()
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Which part of the synth a named parameter update addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamTarget {
    /// Amplitude envelope (attack, decay, sustain, release).
    Envelope,
    /// Cutoff envelope of the filter stage.
    FilterEnvelope,
    /// type, cutoff, resonance, env_amount.
    Filter,
    /// One oscillator bank entry by index.
    Oscillator(usize),
    Lfo(String),
    Effect(String),
    /// gain.
    Master,
    /// mode, max_voices.
    Voice,
}

impl fmt::Display for ParamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamTarget::Envelope => f.write_str("envelope"),
            ParamTarget::FilterEnvelope => f.write_str("filter envelope"),
            ParamTarget::Filter => f.write_str("filter"),
            ParamTarget::Oscillator(index) => write!(f, "oscillator {index}"),
            ParamTarget::Lfo(id) => write!(f, "lfo `{id}`"),
            ParamTarget::Effect(id) => write!(f, "effect `{id}`"),
            ParamTarget::Master => f.write_str("master"),
            ParamTarget::Voice => f.write_str("voice"),
        }
    }
}
