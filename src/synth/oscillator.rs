/*
Oscillator Bank
===============

A voice is built from a small stack of oscillators that all play the same
note. Each bank entry describes one layer:

  waveform   Sine, sawtooth, square, triangle or noise.
  detune     Offset from the note in cents (100 cents = 1 semitone).
  level      Mix level of this layer, 0.0 to 1.0.

Detuning two sawtooths a few cents apart is the classic "supersaw" trick:
the small frequency difference makes them drift in and out of phase, which
sounds wide and animated.

    effective_hz = base_hz · 2^(detune / 1200)

Per voice, each entry becomes:

    [generator: freq = base, detune = cents] ──► [level gain] ──► filter

LFO pitch taps add onto every generator's frequency parameter in Hz, so a
pitch depth of 5 gives ±5 Hz vibrato whatever the note.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::oscillator::Waveform,
    graph::{Graph, NodeId, ParamKind},
    synth::config::ParamValue,
    Error, Result,
};

/// Layers per voice.
pub const MAX_OSCILLATORS: usize = 8;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorConfig {
    pub waveform: Waveform,
    /// Cents.
    pub detune: f32,
    pub level: f32,
}

impl OscillatorConfig {
    pub fn new(waveform: Waveform, detune: f32, level: f32) -> Self {
        Self {
            waveform,
            detune,
            level: level.clamp(0.0, 1.0),
        }
    }
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self::new(Waveform::Sawtooth, 0.0, 1.0)
    }
}

/// One live layer of one voice.
#[derive(Debug, Clone, Copy)]
pub struct OscillatorInstance {
    pub config: OscillatorConfig,
    pub generator: NodeId,
    pub level: NodeId,
}

#[derive(Debug, Clone, Default)]
pub struct OscillatorBank {
    configs: Vec<OscillatorConfig>,
}

impl OscillatorBank {
    pub fn new(configs: Vec<OscillatorConfig>) -> Result<Self> {
        let mut bank = Self::default();
        bank.set_configs(configs)?;
        Ok(bank)
    }

    pub fn configs(&self) -> &[OscillatorConfig] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn set_configs(&mut self, configs: Vec<OscillatorConfig>) -> Result<()> {
        if configs.len() > MAX_OSCILLATORS {
            return Err(Error::Configuration(format!(
                "{} oscillators requested, at most {MAX_OSCILLATORS} allowed",
                configs.len()
            )));
        }
        self.configs = configs
            .into_iter()
            .map(|c| OscillatorConfig::new(c.waveform, c.detune, c.level))
            .collect();
        Ok(())
    }

    /// Append a layer, returning its index.
    pub fn add(&mut self, config: OscillatorConfig) -> Result<usize> {
        if self.configs.len() >= MAX_OSCILLATORS {
            return Err(Error::Configuration(format!(
                "oscillator bank is full ({MAX_OSCILLATORS} layers)"
            )));
        }
        self.configs
            .push(OscillatorConfig::new(config.waveform, config.detune, config.level));
        Ok(self.configs.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Option<OscillatorConfig> {
        (index < self.configs.len()).then(|| self.configs.remove(index))
    }

    /// Named update of one layer. Applies to voices created afterwards.
    pub fn set(&mut self, index: usize, name: &str, value: &ParamValue) -> Result<()> {
        let config = self.configs.get_mut(index).ok_or_else(|| {
            Error::Configuration(format!("no oscillator at index {index}"))
        })?;
        match name {
            "waveform" => config.waveform = value.parse(name)?,
            "detune" => config.detune = value.as_number(name)?,
            "level" => config.level = value.as_number(name)?.clamp(0.0, 1.0),
            _ => return Err(Error::unknown_param(format!("oscillator {index}"), name)),
        }
        Ok(())
    }

    /// One generator and level gain per layer, summed into
    /// `filter_destination`. Generators are created stopped.
    pub fn create_oscillators(
        &self,
        graph: &mut Graph,
        base_frequency: f32,
        filter_destination: NodeId,
        pitch_mods: &[NodeId],
    ) -> Result<Vec<OscillatorInstance>> {
        let mut instances = Vec::with_capacity(self.configs.len());

        for config in &self.configs {
            let generator = graph.add_oscillator(config.waveform, base_frequency);
            let level = graph.add_gain(config.level);
            instances.push(OscillatorInstance {
                config: *config,
                generator,
                level,
            });

            let wired = graph
                .set_param(generator.param(ParamKind::Detune), config.detune)
                .and_then(|_| graph.connect(generator, level))
                .and_then(|_| graph.connect(level, filter_destination))
                .and_then(|_| {
                    pitch_mods.iter().try_for_each(|&source| {
                        graph.connect_param(source, generator.param(ParamKind::Frequency))
                    })
                });

            if let Err(err) = wired {
                free_oscillators(graph, &instances);
                return Err(err);
            }
        }

        Ok(instances)
    }

    pub fn start_oscillators(&self, graph: &mut Graph, instances: &[OscillatorInstance]) -> Result<()> {
        let now = graph.current_time();
        for instance in instances {
            graph.start(instance.generator, now)?;
        }
        Ok(())
    }

    /// Stop at `at`, or now when `None`.
    pub fn stop_oscillators(
        &self,
        graph: &mut Graph,
        instances: &[OscillatorInstance],
        at: Option<f64>,
    ) -> Result<()> {
        let time = at.unwrap_or_else(|| graph.current_time());
        for instance in instances {
            graph.stop(instance.generator, time)?;
        }
        Ok(())
    }
}

/// Remove every node belonging to `instances`.
pub(crate) fn free_oscillators(graph: &mut Graph, instances: &[OscillatorInstance]) {
    for instance in instances {
        let _ = graph.remove(instance.generator);
        let _ = graph.remove(instance.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_saws() -> OscillatorBank {
        OscillatorBank::new(vec![
            OscillatorConfig::new(Waveform::Sawtooth, -10.0, 0.5),
            OscillatorConfig::new(Waveform::Square, 1200.0, 0.25),
        ])
        .unwrap()
    }

    #[test]
    fn creates_one_layer_per_config() {
        let mut graph = Graph::new(48_000.0);
        let filter = graph.add_gain(1.0);
        let bank = two_saws();
        let layers = bank.create_oscillators(&mut graph, 220.0, filter, &[]).unwrap();

        assert_eq!(layers.len(), 2);
        for layer in &layers {
            assert!(graph.is_connected(layer.generator, layer.level));
            assert!(graph.is_connected(layer.level, filter));
            assert_eq!(
                graph.param_value(layer.generator.param(ParamKind::Frequency)).unwrap(),
                220.0
            );
        }
        assert_eq!(
            graph.param_value(layers[1].generator.param(ParamKind::Detune)).unwrap(),
            1200.0
        );
        assert_eq!(
            graph.param_value(layers[1].level.param(ParamKind::Gain)).unwrap(),
            0.25
        );
    }

    #[test]
    fn detune_shifts_pitch() {
        // +1200 cents doubles the frequency: count zero crossings of a square
        let mut graph = Graph::new(48_000.0);
        let bank = OscillatorBank::new(vec![OscillatorConfig::new(Waveform::Square, 1200.0, 1.0)]).unwrap();
        let dest = graph.destination();
        let layers = bank.create_oscillators(&mut graph, 100.0, dest, &[]).unwrap();
        bank.start_oscillators(&mut graph, &layers).unwrap();

        let mut out = vec![0.0; 48_000];
        graph.render(&mut out);
        let rising = out.windows(2).filter(|w| w[0] < 0.0 && w[1] > 0.0).count();
        assert!((199..=201).contains(&rising), "{rising} cycles");
    }

    #[test]
    fn pitch_mods_reach_every_generator() {
        let mut graph = Graph::new(48_000.0);
        let tap = graph.add_gain(5.0);
        let filter = graph.add_gain(1.0);
        let layers = two_saws()
            .create_oscillators(&mut graph, 440.0, filter, &[tap])
            .unwrap();

        for layer in &layers {
            assert!(graph.is_param_connected(tap, layer.generator.param(ParamKind::Frequency)));
        }
    }

    #[test]
    fn failed_wiring_leaves_no_nodes() {
        let mut graph = Graph::new(48_000.0);
        let gone = graph.add_gain(1.0);
        graph.remove(gone).unwrap();
        let before = graph.node_count();

        assert!(two_saws()
            .create_oscillators(&mut graph, 440.0, gone, &[])
            .is_err());
        assert_eq!(graph.node_count(), before);
    }

    #[test]
    fn stop_defaults_to_now() {
        let mut graph = Graph::new(48_000.0);
        let bank = two_saws();
        let dest = graph.destination();
        let layers = bank.create_oscillators(&mut graph, 440.0, dest, &[]).unwrap();
        bank.start_oscillators(&mut graph, &layers).unwrap();
        bank.stop_oscillators(&mut graph, &layers, None).unwrap();

        assert!(layers.iter().all(|l| graph.is_finished(l.generator).unwrap()));
    }

    #[test]
    fn bank_is_bounded() {
        let configs = vec![OscillatorConfig::default(); MAX_OSCILLATORS + 1];
        assert!(OscillatorBank::new(configs).is_err());

        let mut bank = OscillatorBank::new(vec![OscillatorConfig::default(); MAX_OSCILLATORS]).unwrap();
        assert!(bank.add(OscillatorConfig::default()).is_err());
        assert!(bank.remove(0).is_some());
        assert_eq!(bank.add(OscillatorConfig::default()).unwrap(), MAX_OSCILLATORS - 1);
    }

    #[test]
    fn named_layer_updates() {
        let mut bank = two_saws();
        bank.set(0, "waveform", &ParamValue::from("sine")).unwrap();
        bank.set(0, "level", &ParamValue::from(4.0)).unwrap();

        assert_eq!(bank.configs()[0].waveform, Waveform::Sine);
        assert_eq!(bank.configs()[0].level, 1.0);
        assert!(bank.set(5, "level", &ParamValue::from(0.5)).is_err());
    }
}
