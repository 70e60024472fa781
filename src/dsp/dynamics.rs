//! Dynamics - feed-forward peak compressor.
//!
//! Vocabulary
//! ----------
//!
//!   threshold   Level (dBFS) above which gain reduction starts.
//!   ratio       Input dB above threshold per output dB above threshold.
//!               4 means 8 dB over becomes 2 dB over.
//!   knee        Width (dB) of the region around the threshold where the
//!               ratio fades in gradually instead of switching abruptly.
//!   attack      Seconds for the gain to move ~63% toward more reduction.
//!   release     Seconds for the gain to move ~63% back toward unity.
//!
//! The static curve (output level for a steady input level x, all in dB):
//!
//! ```text
//!   x < T - W/2          y = x
//!   |x - T| <= W/2       y = x + (1/R - 1)(x - T + W/2)² / 2W
//!   x > T + W/2          y = T + (x - T) / R
//! ```
//!
//! The difference y - x is the target gain; it is smoothed by one-pole
//! attack/release filters before being applied.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack: f32,
    pub release: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

/// Output level (dB) of the static compression curve.
pub fn static_curve(input_db: f32, threshold_db: f32, knee_db: f32, ratio: f32) -> f32 {
    let ratio = ratio.max(1.0);
    let knee = knee_db.max(0.0);
    let over = input_db - threshold_db;

    if 2.0 * over < -knee {
        input_db
    } else if knee > 0.0 && 2.0 * over.abs() <= knee {
        let x = over + knee / 2.0;
        input_db + (1.0 / ratio - 1.0) * x * x / (2.0 * knee)
    } else {
        threshold_db + over / ratio
    }
}

pub struct Compressor {
    gain_db: f32,
}

impl Compressor {
    pub fn new() -> Self {
        Self { gain_db: 0.0 }
    }

    /// Current gain reduction in dB (zero or negative).
    pub fn reduction_db(&self) -> f32 {
        self.gain_db
    }

    /// Compress `buffer` in place. Settings are held for the whole block.
    pub fn process_block(
        &mut self,
        buffer: &mut [f32],
        settings: &CompressorSettings,
        sample_rate: f32,
    ) {
        let attack = (-1.0 / (settings.attack.max(1e-4) * sample_rate)).exp();
        let release = (-1.0 / (settings.release.max(1e-4) * sample_rate)).exp();

        for sample in buffer.iter_mut() {
            let level_db = 20.0 * sample.abs().max(1e-6).log10();
            let target = static_curve(
                level_db,
                settings.threshold_db,
                settings.knee_db,
                settings.ratio,
            ) - level_db;

            let coeff = if target < self.gain_db { attack } else { release };
            self.gain_db = coeff * self.gain_db + (1.0 - coeff) * target;

            *sample *= 10.0_f32.powf(self.gain_db / 20.0);
        }
    }

    pub fn reset(&mut self) {
        self.gain_db = 0.0;
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_is_identity_below_knee() {
        assert!((static_curve(-60.0, -24.0, 6.0, 4.0) + 60.0).abs() < 1e-6);
    }

    #[test]
    fn curve_applies_ratio_above_knee() {
        // 16 dB over at 4:1 leaves 4 dB over
        let y = static_curve(-8.0, -24.0, 0.0, 4.0);
        assert!((y + 20.0).abs() < 1e-5, "got {y}");
    }

    #[test]
    fn knee_is_continuous() {
        let t = -20.0;
        let w = 10.0;
        let below = static_curve(t - w / 2.0 - 1e-3, t, w, 8.0);
        let inside_low = static_curve(t - w / 2.0 + 1e-3, t, w, 8.0);
        let inside_high = static_curve(t + w / 2.0 - 1e-3, t, w, 8.0);
        let above = static_curve(t + w / 2.0 + 1e-3, t, w, 8.0);

        assert!((below - inside_low).abs() < 0.01);
        assert!((inside_high - above).abs() < 0.01);
    }

    #[test]
    fn loud_signal_settles_at_expected_reduction() {
        let settings = CompressorSettings {
            threshold_db: -24.0,
            knee_db: 0.0,
            ratio: 12.0,
            attack: 0.001,
            release: 0.1,
        };
        let mut comp = Compressor::new();
        let mut buffer = vec![1.0; 48_000];
        comp.process_block(&mut buffer, &settings, 48_000.0);

        // 0 dBFS is 24 dB over; 12:1 leaves 2 dB over → -22 dB of gain
        assert!((comp.reduction_db() + 22.0).abs() < 0.5, "{}", comp.reduction_db());
        assert!(buffer[47_999] < 0.1);
    }

    #[test]
    fn quiet_signal_is_untouched() {
        let mut comp = Compressor::new();
        let mut buffer = vec![0.001; 4_800];
        comp.process_block(&mut buffer, &CompressorSettings::default(), 48_000.0);

        assert!(comp.reduction_db().abs() < 1e-3);
        assert!((buffer[4_799] - 0.001).abs() < 1e-6);
    }
}
