/*
Flanger
=======

One very short delay (1 - 10 ms) swept by an LFO, with part of the output
fed back into the line. Mixing it with the dry signal produces a comb
filter whose notches slide up and down: the "jet plane" whoosh.

    [input] ──► [delay ⟲ feedback] ◄── LFO ──► wet

Higher feedback deepens the notches and adds a metallic ring.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::oscillator::Waveform,
    effects::unit::{
        already_initialized, bounded, mix_value, remove_nodes, DryWet, EffectConfig, EffectPorts,
        EffectUnit, Modulator, MAX_RATE,
    },
    graph::{Graph, NodeId, ParamKind},
    synth::config::ParamValue,
    Error, Result,
};

const MAX_DELAY: f32 = 0.03;
const MAX_FEEDBACK: f32 = 0.95;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlangerConfig {
    /// Hz.
    pub rate: f32,
    /// ms.
    pub depth: f32,
    /// ms.
    pub delay: f32,
    pub feedback: f32,
    pub mix: f32,
}

impl FlangerConfig {
    pub fn clamped(self) -> Self {
        Self {
            rate: bounded(self.rate, 0.0, MAX_RATE),
            depth: bounded(self.depth, 0.0, 10.0),
            delay: bounded(self.delay, 0.1, 15.0),
            feedback: bounded(self.feedback, -MAX_FEEDBACK, MAX_FEEDBACK),
            mix: bounded(self.mix, 0.0, 1.0),
        }
    }
}

impl Default for FlangerConfig {
    fn default() -> Self {
        Self {
            rate: 0.25,
            depth: 2.0,
            delay: 3.0,
            feedback: 0.5,
            mix: 0.0,
        }
    }
}

struct FlangerNodes {
    dry_wet: DryWet,
    delay: NodeId,
    modulator: Modulator,
}

pub struct Flanger {
    config: FlangerConfig,
    nodes: Option<FlangerNodes>,
}

impl Flanger {
    pub fn new(config: FlangerConfig) -> Self {
        Self {
            config: config.clamped(),
            nodes: None,
        }
    }

    pub fn settings(&self) -> &FlangerConfig {
        &self.config
    }

    fn apply(&self, graph: &mut Graph) -> Result<()> {
        let Some(nodes) = &self.nodes else {
            return Ok(());
        };
        nodes.dry_wet.set_mix(graph, self.config.mix)?;
        graph.set_param(nodes.delay.param(ParamKind::DelayTime), self.config.delay / 1000.0)?;
        graph.set_param(nodes.delay.param(ParamKind::Feedback), self.config.feedback)?;
        nodes.modulator.set_rate(graph, self.config.rate)?;
        nodes.modulator.set_depth(graph, self.config.depth / 1000.0)
    }
}

impl Default for Flanger {
    fn default() -> Self {
        Self::new(FlangerConfig::default())
    }
}

impl EffectUnit for Flanger {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.nodes.is_some() {
            return Err(already_initialized("flanger"));
        }
        let config = self.config;
        let dry_wet = DryWet::build(graph, config.mix)?;
        let delay = graph.add_delay(MAX_DELAY, config.delay / 1000.0, config.feedback);
        graph.connect(dry_wet.input, delay)?;
        graph.connect(delay, dry_wet.wet)?;

        let modulator = Modulator::build(graph, Waveform::Sine, config.rate, config.depth / 1000.0, 0.0)?;
        modulator.modulate(graph, delay, ParamKind::DelayTime)?;

        let ports = dry_wet.ports();
        self.nodes = Some(FlangerNodes {
            dry_wet,
            delay,
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
        EffectConfig::Flanger(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "rate" => self.config.rate = value.as_number(name)?,
            "depth" => self.config.depth = value.as_number(name)?,
            "delay" => self.config.delay = value.as_number(name)?,
            "feedback" => self.config.feedback = value.as_number(name)?,
            "mix" => self.config.mix = mix_value(value)?,
            _ => return Err(Error::unknown_param("flanger", name)),
        }
        self.config = self.config.clamped();
        self.apply(graph)
    }

    fn teardown(&mut self, graph: &mut Graph) {
        if let Some(nodes) = self.nodes.take() {
            remove_nodes(graph, nodes.dry_wet.nodes());
            remove_nodes(graph, nodes.modulator.nodes());
            remove_nodes(graph, [nodes.delay]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_matches_nodes_after_initialize() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut flanger = Flanger::default();
        flanger.initialize(&mut graph, dest).unwrap();

        let nodes = flanger.nodes.as_ref().unwrap();
        let feedback = graph.param_value(nodes.delay.param(ParamKind::Feedback)).unwrap();
        let time = graph.param_value(nodes.delay.param(ParamKind::DelayTime)).unwrap();
        assert_eq!(feedback, 0.5);
        assert!((time - 0.003).abs() < 1e-6);
        assert!(graph.is_param_connected(nodes.modulator.depth, nodes.delay.param(ParamKind::DelayTime)));
    }

    #[test]
    fn feedback_is_bounded() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut flanger = Flanger::default();
        flanger.initialize(&mut graph, dest).unwrap();
        flanger.set_param(&mut graph, "feedback", &ParamValue::from(3.0)).unwrap();

        let nodes = flanger.nodes.as_ref().unwrap();
        assert_eq!(flanger.settings().feedback, MAX_FEEDBACK);
        assert_eq!(
            graph.param_value(nodes.delay.param(ParamKind::Feedback)).unwrap(),
            MAX_FEEDBACK
        );
    }

    #[test]
    fn out_of_range_config_is_clamped_before_building() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut flanger = Flanger::new(FlangerConfig {
            rate: f32::NAN,
            depth: 50.0,
            delay: 40.0,
            feedback: -2.0,
            mix: 1.0,
        });
        flanger.initialize(&mut graph, dest).unwrap();

        let nodes = flanger.nodes.as_ref().unwrap();
        assert_eq!(flanger.settings().rate, 0.0);
        assert_eq!(flanger.settings().depth, 10.0);
        assert_eq!(flanger.settings().feedback, -MAX_FEEDBACK);
        assert_eq!(
            graph.param_value(nodes.delay.param(ParamKind::Feedback)).unwrap(),
            -MAX_FEEDBACK
        );
        let time = graph.param_value(nodes.delay.param(ParamKind::DelayTime)).unwrap();
        assert!((time - 0.015).abs() < 1e-6);
    }

    #[test]
    fn teardown_removes_the_running_modulator() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let baseline = graph.node_count();
        let mut flanger = Flanger::default();
        flanger.initialize(&mut graph, dest).unwrap();
        let lfo = flanger.nodes.as_ref().unwrap().modulator.oscillator;

        flanger.teardown(&mut graph);
        assert!(!flanger.is_initialized());
        assert!(!graph.contains(lfo));
        assert_eq!(graph.node_count(), baseline);

        // A second call has nothing left to remove.
        flanger.teardown(&mut graph);
        assert_eq!(graph.node_count(), baseline);
    }
}
