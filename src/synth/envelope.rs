/*
ADSR Envelope Scheduling
========================

Envelopes here do not run per sample. Scheduling an envelope writes a
handful of events into a parameter's timeline and returns immediately; the
graph renders the curve later, frame-accurately.

Vocabulary
----------

  attack    Seconds to ramp from the start value to the peak.
  decay     Seconds to fall from the peak to the sustain level.
  sustain   Fraction of the peak (0.0 to 1.0) held while the note is down.
  release   Seconds to fall from wherever the envelope is to the end value.


The Shape
---------

  Level
   peak ┐     ╱╲
        │    ╱  ╲___________
  peak·S│   ╱               ╲
        │  ╱                 ╲
  start └─╱───────────────────╲──→ Time
        t0  A    D    (held)   t1   R

Note on at t0 writes:

    set_value_at(start, t0)
    linear_ramp_to(peak, t0 + A)
    linear_ramp_to(peak · S, t0 + A + D)

Note off at t1 writes:

    cancel_and_hold(t1)            pin the live value, drop attack/decay
    linear_ramp_to(end, t1 + R)

Cancel-and-hold matters when a short note is released mid-attack: the
release starts from the level actually reached instead of jumping to the
peak or the sustain level first.

Zero-length stages would produce a ramp with no duration, so every stage
is clamped to at least one sample at 48 kHz.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    graph::{Graph, ParamRef},
    Error, Result, MIN_TIME,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeConfig {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeConfig {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
        .clamped()
    }

    /// Stage times non-negative, sustain within 0.0..=1.0. NaN becomes 0.
    pub fn clamped(self) -> Self {
        let time = |t: f32| if t.is_nan() { 0.0 } else { t.max(0.0) };
        Self {
            attack: time(self.attack),
            decay: time(self.decay),
            sustain: if self.sustain.is_nan() {
                0.0
            } else {
                self.sustain.clamp(0.0, 1.0)
            },
            release: time(self.release),
        }
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self::new(0.01, 0.2, 0.7, 0.3)
    }
}

#[inline]
fn stage(seconds: f32) -> f64 {
    seconds.max(MIN_TIME) as f64
}

pub struct EnvelopeScheduler {
    config: EnvelopeConfig,
}

impl EnvelopeScheduler {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self {
            config: config.clamped(),
        }
    }

    pub fn config(&self) -> EnvelopeConfig {
        self.config
    }

    pub fn set_config(&mut self, config: EnvelopeConfig) {
        self.config = config.clamped();
    }

    /// Update one stage by name. Takes effect on the next scheduled note.
    pub fn set(&mut self, name: &str, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::invalid_value(name, "value must be finite"));
        }
        match name {
            "attack" => self.config.attack = value,
            "decay" => self.config.decay = value,
            "sustain" => self.config.sustain = value,
            "release" => self.config.release = value,
            _ => return Err(Error::unknown_param("envelope", name)),
        }
        self.config = self.config.clamped();
        Ok(())
    }

    /// Release duration as it will be scheduled.
    pub fn release_time(&self) -> f64 {
        stage(self.config.release)
    }

    /// Attack to `peak`, decay to `peak * sustain`.
    pub fn apply_envelope(
        &self,
        graph: &mut Graph,
        param: ParamRef,
        t0: f64,
        start: f32,
        peak: f32,
    ) -> Result<()> {
        let settle = peak * self.config.sustain;
        self.apply_shape(graph, param, t0, start, peak, settle)
    }

    /// Attack to `peak`, decay to an explicit `settle` level.
    ///
    /// Used when the sustain level is an offset from a base rather than a
    /// fraction of the peak, as with filter cutoff sweeps.
    pub fn apply_shape(
        &self,
        graph: &mut Graph,
        param: ParamRef,
        t0: f64,
        start: f32,
        peak: f32,
        settle: f32,
    ) -> Result<()> {
        let attack_end = t0 + stage(self.config.attack);
        let decay_end = attack_end + stage(self.config.decay);

        graph.cancel_scheduled(param, t0)?;
        graph.set_value_at(param, start, t0)?;
        graph.linear_ramp_to(param, peak, attack_end)?;
        graph.linear_ramp_to(param, settle, decay_end)?;
        Ok(())
    }

    /// Ramp from the live value at `t0` to `end`. Returns the release
    /// duration so callers can schedule teardown after it.
    pub fn apply_release(
        &self,
        graph: &mut Graph,
        param: ParamRef,
        t0: f64,
        end: f32,
    ) -> Result<f64> {
        let release = self.release_time();
        graph.cancel_and_hold(param, t0)?;
        graph.linear_ramp_to(param, end, t0 + release)?;
        Ok(release)
    }
}

impl Default for EnvelopeScheduler {
    fn default() -> Self {
        Self::new(EnvelopeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ParamKind;

    fn setup() -> (Graph, ParamRef) {
        let mut graph = Graph::new(48_000.0);
        let gain = graph.add_gain(0.0);
        (graph, gain.param(ParamKind::Gain))
    }

    #[test]
    fn envelope_hits_peak_and_sustain() {
        let (mut graph, param) = setup();
        let scheduler = EnvelopeScheduler::new(EnvelopeConfig::new(0.1, 0.2, 0.5, 0.3));
        let t0 = 0.5;
        scheduler.apply_envelope(&mut graph, param, t0, 0.0, 1.0).unwrap();

        let at = |t: f64| graph.value_at(param, t).unwrap();
        assert!((at(t0) - 0.0).abs() < 1e-4);
        assert!((at(t0 + 0.05) - 0.5).abs() < 1e-3);
        assert!((at(t0 + 0.1) - 1.0).abs() < 1e-4);
        assert!((at(t0 + 0.2) - 0.75).abs() < 1e-3);
        assert!((at(t0 + 0.3) - 0.5).abs() < 1e-4);
        assert!((at(t0 + 5.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn release_returns_configured_duration() {
        let (mut graph, param) = setup();
        let scheduler = EnvelopeScheduler::new(EnvelopeConfig::new(0.1, 0.2, 0.5, 0.3));
        scheduler.apply_envelope(&mut graph, param, 0.0, 0.0, 1.0).unwrap();

        let release = scheduler.apply_release(&mut graph, param, 1.0, 0.0).unwrap();
        assert_eq!(release, 0.3_f32 as f64);
        assert!((graph.value_at(param, 1.0).unwrap() - 0.5).abs() < 1e-4);
        assert!(graph.value_at(param, 1.0 + release).unwrap().abs() < 1e-6);
    }

    #[test]
    fn release_mid_attack_starts_from_reached_level() {
        let (mut graph, param) = setup();
        let scheduler = EnvelopeScheduler::new(EnvelopeConfig::new(1.0, 0.5, 0.5, 1.0));
        scheduler.apply_envelope(&mut graph, param, 0.0, 0.0, 1.0).unwrap();
        scheduler.apply_release(&mut graph, param, 0.25, 0.0).unwrap();

        let at = |t: f64| graph.value_at(param, t).unwrap();
        assert!((at(0.25) - 0.25).abs() < 1e-3);
        assert!((at(0.75) - 0.125).abs() < 1e-3);
        // the attack never resumes
        assert!(at(1.0) < 0.25);
    }

    #[test]
    fn zero_durations_are_clamped() {
        let (mut graph, param) = setup();
        let scheduler = EnvelopeScheduler::new(EnvelopeConfig::new(0.0, -1.0, 1.0, 0.0));
        scheduler.apply_envelope(&mut graph, param, 0.0, 0.0, 1.0).unwrap();

        assert_eq!(scheduler.release_time(), MIN_TIME as f64);
        assert!((graph.value_at(param, 0.01).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn set_by_name() {
        let mut scheduler = EnvelopeScheduler::default();
        scheduler.set("attack", 0.5).unwrap();
        scheduler.set("sustain", 3.0).unwrap();

        assert_eq!(scheduler.config().attack, 0.5);
        assert_eq!(scheduler.config().sustain, 1.0);
        assert!(matches!(
            scheduler.set("hold", 1.0),
            Err(Error::UnknownParameter { .. })
        ));
    }

    #[test]
    fn literal_config_sustain_is_clamped() {
        let mut graph = Graph::new(48_000.0);
        let gain = graph.add_gain(0.0);
        let param = gain.param(ParamKind::Gain);
        let scheduler = EnvelopeScheduler::new(EnvelopeConfig {
            attack: 0.1,
            decay: 0.1,
            sustain: 3.0,
            release: -1.0,
        });
        assert_eq!(scheduler.config().sustain, 1.0);
        assert_eq!(scheduler.config().release, 0.0);

        scheduler.apply_envelope(&mut graph, param, 0.0, 0.0, 1.0).unwrap();
        let held = graph.value_at(param, 0.5).unwrap();
        assert!(held <= 1.0 + 1e-6);
        assert!((held - 1.0).abs() < 1e-6);
    }
}
