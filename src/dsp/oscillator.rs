use std::{f32::consts::TAU, fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Error;

/*
Phase-Accumulator Oscillator
============================

Every periodic waveform here is a function of a single phase value in
[0, 1). Each sample we read the waveform at the current phase and then
advance it:

    phase += frequency / sample_rate
    if phase >= 1.0 { phase -= 1.0 }

Because frequency is passed in per sample, the same accumulator serves
audio-rate voices and control-rate LFOs, and frequency modulation is just
a different number arriving each sample.

    Sine       sin(2π·phase)
    Sawtooth   2·phase - 1              (rising ramp)
    Square     +1 below 0.5, -1 above
    Triangle   1 - 4·|phase - 0.5|      (starts at -1, peaks at 0.5)
    Noise      uniform white noise, phase ignored

All outputs are bipolar in [-1, 1]. No band-limiting is applied.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Sawtooth,
    Square,
    Triangle,
    Noise,
}

impl Waveform {
    /// Evaluate the waveform at `phase` (0.0 to 1.0).
    #[inline]
    pub fn sample(self, phase: f32, rng: &mut fastrand::Rng) -> f32 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Noise => rng.f32() * 2.0 - 1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Noise => "noise",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sine" | "sin" => Ok(Waveform::Sine),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "square" => Ok(Waveform::Square),
            "triangle" | "tri" => Ok(Waveform::Triangle),
            "noise" => Ok(Waveform::Noise),
            other => Err(Error::invalid_value(
                "waveform",
                format!("unknown waveform `{other}`"),
            )),
        }
    }
}

pub struct OscillatorBlock {
    waveform: Waveform,
    phase: f32,
    rng: fastrand::Rng,
}

impl OscillatorBlock {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
            rng: fastrand::Rng::with_seed(0x5eed),
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Jump to a phase offset (wrapped into 0.0 - 1.0).
    pub fn set_phase(&mut self, phase: f32) {
        let wrapped = phase.rem_euclid(1.0);
        self.phase = if wrapped >= 1.0 { 0.0 } else { wrapped };
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Produce one sample and advance by `frequency / sample_rate` cycles.
    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let value = self.waveform.sample(self.phase, &mut self.rng);

        self.phase += frequency / sample_rate;
        if !(0.0..1.0).contains(&self.phase) {
            self.phase = self.phase.rem_euclid(1.0);
            // rem_euclid can round up to exactly 1.0 for tiny negatives
            if self.phase >= 1.0 {
                self.phase = 0.0;
            }
        }

        value
    }
}
