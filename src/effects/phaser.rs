/*
Phaser
======

A cascade of all-pass filters. Each stage passes every frequency at full
level but delays its phase around the stage's centre frequency. Mixed with
the dry signal, the phase-shifted copy cancels at a few frequencies,
carving notches; an LFO sweeps the centre frequency so the notches move.

    [input] ──► [AP 1] ──► [AP 2] ──► ... ──► [AP n] ──► wet
                  ▲          ▲                  ▲
                  └──────────┴──── LFO ─────────┘

Two stages make one notch; four stages (the default) make two.

  rate        LFO speed in Hz
  depth       Sweep in Hz around the centre
  frequency   Centre frequency in Hz
  stages      Number of all-pass stages (fixed once built)
  q           Resonance of each stage
  mix         Dry/wet blend
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{filter::FilterType, oscillator::Waveform},
    effects::unit::{
        already_initialized, bounded, mix_value, remove_nodes, DryWet, EffectConfig, EffectPorts,
        EffectUnit, Modulator, MAX_RATE,
    },
    graph::{Graph, NodeId, ParamKind},
    synth::config::ParamValue,
    Error, Result,
};

pub const MAX_STAGES: usize = 12;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaserConfig {
    pub rate: f32,
    pub depth: f32,
    pub frequency: f32,
    pub stages: usize,
    pub q: f32,
    pub mix: f32,
}

impl PhaserConfig {
    pub fn clamped(self) -> Self {
        Self {
            rate: bounded(self.rate, 0.0, MAX_RATE),
            depth: bounded(self.depth, 0.0, 20_000.0),
            frequency: bounded(self.frequency, 20.0, 20_000.0),
            stages: self.stages.clamp(1, MAX_STAGES),
            q: bounded(self.q, 0.01, 30.0),
            mix: bounded(self.mix, 0.0, 1.0),
        }
    }
}

impl Default for PhaserConfig {
    fn default() -> Self {
        Self {
            rate: 0.5,
            depth: 800.0,
            frequency: 1_000.0,
            stages: 4,
            q: 0.7,
            mix: 0.0,
        }
    }
}

struct PhaserNodes {
    dry_wet: DryWet,
    stages: Vec<NodeId>,
    modulator: Modulator,
}

pub struct Phaser {
    config: PhaserConfig,
    nodes: Option<PhaserNodes>,
}

impl Phaser {
    pub fn new(config: PhaserConfig) -> Self {
        Self {
            config: config.clamped(),
            nodes: None,
        }
    }

    pub fn settings(&self) -> &PhaserConfig {
        &self.config
    }

    fn apply(&self, graph: &mut Graph) -> Result<()> {
        let Some(nodes) = &self.nodes else {
            return Ok(());
        };
        nodes.dry_wet.set_mix(graph, self.config.mix)?;
        for &stage in &nodes.stages {
            graph.set_param(stage.param(ParamKind::Frequency), self.config.frequency)?;
            graph.set_param(stage.param(ParamKind::Q), self.config.q)?;
        }
        nodes.modulator.set_rate(graph, self.config.rate)?;
        nodes.modulator.set_depth(graph, self.config.depth)
    }
}

impl Default for Phaser {
    fn default() -> Self {
        Self::new(PhaserConfig::default())
    }
}

impl EffectUnit for Phaser {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.nodes.is_some() {
            return Err(already_initialized("phaser"));
        }
        let config = self.config;
        let dry_wet = DryWet::build(graph, config.mix)?;
        let modulator = Modulator::build(graph, Waveform::Sine, config.rate, config.depth, 0.0)?;

        let mut stages = Vec::with_capacity(config.stages);
        let mut previous = dry_wet.input;
        for _ in 0..config.stages {
            let stage = graph.add_filter(FilterType::AllPass, config.frequency, config.q);
            graph.connect(previous, stage)?;
            modulator.modulate(graph, stage, ParamKind::Frequency)?;
            stages.push(stage);
            previous = stage;
        }
        graph.connect(previous, dry_wet.wet)?;

        let ports = dry_wet.ports();
        self.nodes = Some(PhaserNodes {
            dry_wet,
            stages,
            modulator,
        });
        Ok(ports)
    }

    fn input(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.input)
    }

    fn output(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.output)
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Phaser(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "rate" => self.config.rate = value.as_number(name)?,
            "depth" => self.config.depth = value.as_number(name)?,
            "frequency" => self.config.frequency = value.as_number(name)?,
            "q" => self.config.q = value.as_number(name)?,
            "mix" => self.config.mix = mix_value(value)?,
            "stages" => {
                if self.nodes.is_some() {
                    return Err(Error::Configuration(
                        "phaser stages can only change before initialize".into(),
                    ));
                }
                self.config.stages = value.as_number(name)?.round() as usize;
            }
            _ => return Err(Error::unknown_param("phaser", name)),
        }
        self.config = self.config.clamped();
        self.apply(graph)
    }

    fn teardown(&mut self, graph: &mut Graph) {
        if let Some(nodes) = self.nodes.take() {
            remove_nodes(graph, nodes.dry_wet.nodes());
            remove_nodes(graph, nodes.modulator.nodes());
            remove_nodes(graph, nodes.stages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_all_pass_cascade() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut phaser = Phaser::new(PhaserConfig {
            stages: 6,
            ..PhaserConfig::default()
        });
        phaser.initialize(&mut graph, dest).unwrap();

        let nodes = phaser.nodes.as_ref().unwrap();
        assert_eq!(nodes.stages.len(), 6);
        for pair in nodes.stages.windows(2) {
            assert!(graph.is_connected(pair[0], pair[1]));
        }
        for &stage in &nodes.stages {
            assert_eq!(graph.filter_type(stage).unwrap(), FilterType::AllPass);
            assert_eq!(graph.param_value(stage.param(ParamKind::Frequency)).unwrap(), 1_000.0);
            assert!(graph.is_param_connected(nodes.modulator.depth, stage.param(ParamKind::Frequency)));
        }
    }

    #[test]
    fn stages_are_fixed_once_built() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut phaser = Phaser::default();
        phaser.set_param(&mut graph, "stages", &ParamValue::from(8.0)).unwrap();
        assert_eq!(phaser.settings().stages, 8);

        phaser.initialize(&mut graph, dest).unwrap();
        assert!(phaser.set_param(&mut graph, "stages", &ParamValue::from(2.0)).is_err());
        assert_eq!(phaser.settings().stages, 8);
    }
}
