//! Distortion / Waveshaping
//!
//! A waveshaper maps each input sample through a fixed transfer curve:
//!
//!   output = curve(input)
//!
//! The curve is a lookup table spanning inputs -1.0 to +1.0. Building the
//! table is the expensive part, so it is regenerated only when the shape or
//! drive changes; the audio path just interpolates between table entries.
//!
//! # Shapes
//!
//! Soft (x / (1 + |x|)):
//!   Smooth, warm saturation that gradually compresses peaks.
//!
//! Hard (clamp):
//!   Harsh, buzzy clipping rich in odd harmonics.
//!
//! Foldback:
//!   Signal folds back on itself past the threshold. Metallic, complex.
//!
//! # Drive Values
//!
//!   1.0  = Clean (no distortion)
//!   2-4  = Warm saturation
//!   5-10 = Obvious distortion
//!   10+  = Heavy, aggressive

use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Error;

/// Entries in a generated transfer curve.
pub const CURVE_LENGTH: usize = 2048;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DistortionMode {
    #[default]
    Soft,
    Hard,
    Foldback,
}

impl DistortionMode {
    pub fn name(self) -> &'static str {
        match self {
            DistortionMode::Soft => "soft",
            DistortionMode::Hard => "hard",
            DistortionMode::Foldback => "foldback",
        }
    }
}

impl FromStr for DistortionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(DistortionMode::Soft),
            "hard" => Ok(DistortionMode::Hard),
            "foldback" | "fold" => Ok(DistortionMode::Foldback),
            other => Err(Error::invalid_value(
                "mode",
                format!("unknown distortion mode `{other}`"),
            )),
        }
    }
}

#[inline]
pub fn soft_clip(sample: f32, drive: f32) -> f32 {
    let x = sample * drive;
    x / (1.0 + x.abs())
}

#[inline]
pub fn hard_clip(sample: f32, drive: f32, threshold: f32) -> f32 {
    (sample * drive).clamp(-threshold, threshold)
}

#[inline]
pub fn foldback(sample: f32, drive: f32, threshold: f32) -> f32 {
    let threshold = threshold.max(0.01);
    let mut x = sample * drive;

    while x > threshold || x < -threshold {
        if x > threshold {
            x = 2.0 * threshold - x;
        } else {
            x = -2.0 * threshold - x;
        }
    }

    x
}

/// Build a transfer curve for `mode` at `drive`.
///
/// Soft curves are rescaled so a full-scale input still reaches ±1.0;
/// otherwise raising the drive would mostly just turn the signal down.
pub fn make_curve(mode: DistortionMode, drive: f32, len: usize) -> Vec<f32> {
    let drive = drive.max(1.0);
    let len = len.max(2);
    let soft_makeup = (1.0 + drive) / drive;

    (0..len)
        .map(|i| {
            let x = i as f32 * 2.0 / (len - 1) as f32 - 1.0;
            match mode {
                DistortionMode::Soft => soft_clip(x, drive) * soft_makeup,
                DistortionMode::Hard => hard_clip(x, drive, 1.0),
                DistortionMode::Foldback => foldback(x, drive, 1.0),
            }
        })
        .collect()
}

/// Look `sample` up in `curve`, interpolating between entries.
///
/// Inputs outside -1.0..1.0 read the end entries. An empty curve passes the
/// sample through.
#[inline]
pub fn apply_curve(curve: &[f32], sample: f32) -> f32 {
    match curve.len() {
        0 => sample,
        1 => curve[0],
        len => {
            let pos = (sample.clamp(-1.0, 1.0) + 1.0) * 0.5 * (len - 1) as f32;
            let idx = (pos.floor() as usize).min(len - 2);
            let frac = pos - idx as f32;
            curve[idx] + (curve[idx + 1] - curve[idx]) * frac
        }
    }
}
