use std::{f32::consts::PI, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Error;

/*
| type              | constructed by       | passes          | rejects      |
| ----------------- | -------------------- | --------------- | ------------ |
| low-pass          | LPF                  | below cutoff    | above cutoff |
| high-pass         | HPF                  | above cutoff    | below cutoff |
| band-pass         | LPF ∘ HPF (series)   | between cutoffs | outside      |
| notch / band-stop | LPF + HPF (parallel) | outside         | between      |
| all-pass          | x - 2k·BP            | everything      | nothing      |

The all-pass response keeps every frequency at unity gain but rotates its
phase by up to 180° around the cutoff. Phasers stack several of them and
sweep the cutoff.

Coefficients follow the topology-preserving transform:

    g = tan(π · cutoff / sample_rate)
    k = 1 / Q

Cutoff and Q may change every sample (envelopes and LFOs write them), so
the coefficients are cached and only recomputed when an input moves.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    Notch,
    AllPass,
}

impl FromStr for FilterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lowpass" | "low-pass" | "lp" => Ok(FilterType::LowPass),
            "highpass" | "high-pass" | "hp" => Ok(FilterType::HighPass),
            "bandpass" | "band-pass" | "bp" => Ok(FilterType::BandPass),
            "notch" => Ok(FilterType::Notch),
            "allpass" | "all-pass" | "ap" => Ok(FilterType::AllPass),
            other => Err(Error::invalid_value(
                "type",
                format!("unknown filter type `{other}`"),
            )),
        }
    }
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
    pub allpass: f32,
}

/// Lowest Q accepted; below this k explodes and the filter turns unstable.
pub const MIN_Q: f32 = 0.025;
/// Lowest cutoff the coefficient math is evaluated at.
pub const MIN_CUTOFF_HZ: f32 = 10.0;

pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    filter_type: FilterType,

    cached_cutoff: f32,
    cached_q: f32,
    cached_rate: f32,
    g: f32,
    k: f32,
}

impl SVFilter {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            filter_type,
            cached_cutoff: f32::NAN,
            cached_q: f32::NAN,
            cached_rate: f32::NAN,
            g: 0.0,
            k: 1.0,
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    #[inline]
    fn update_coefficients(&mut self, cutoff_hz: f32, q: f32, sample_rate: f32) {
        if cutoff_hz == self.cached_cutoff && q == self.cached_q && sample_rate == self.cached_rate
        {
            return;
        }
        self.cached_cutoff = cutoff_hz;
        self.cached_q = q;
        self.cached_rate = sample_rate;

        // Keep the warped frequency strictly below Nyquist
        let cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, sample_rate * 0.49);
        self.g = (PI * cutoff / sample_rate).tan();
        self.k = 1.0 / q.max(MIN_Q);
    }

    pub fn next_sample(&mut self, sample: f32) -> FilterOutputs {
        let g = self.g;
        let k = self.k;
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
            allpass: sample - 2.0 * k * v1,
        }
    }

    /// Filter one sample with the cutoff and Q in effect for that sample.
    #[inline]
    pub fn process(&mut self, sample: f32, cutoff_hz: f32, q: f32, sample_rate: f32) -> f32 {
        self.update_coefficients(cutoff_hz, q, sample_rate);
        let outputs = self.next_sample(sample);

        match self.filter_type {
            FilterType::LowPass => outputs.lowpass,
            FilterType::HighPass => outputs.highpass,
            FilterType::BandPass => outputs.bandpass,
            FilterType::Notch => outputs.notch,
            FilterType::AllPass => outputs.allpass,
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}
