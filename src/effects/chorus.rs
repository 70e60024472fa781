/*
Chorus
======

Three copies of the signal, each delayed by a slowly wobbling amount, mixed
back in with the original. The tiny pitch shifts caused by the moving delay
make one voice sound like several playing together.

                   ┌──► [delay 1] ◄── LFO (phase 0)    ──┐
    [input] ───────┼──► [delay 2] ◄── LFO (phase 1/3)  ──┼──► [sum 1/3] ──► wet
                   └──► [delay 3] ◄── LFO (phase 2/3)  ──┘

Spreading the LFO phases keeps the three copies from moving together, which
would just sound like one vibrato.

Parameters
----------

  rate    LFO speed in Hz (0.5 - 3 typical)
  depth   Delay swing in ms around the base delay
  delay   Base delay in ms (10 - 30 typical)
  mix     Dry/wet blend
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

const VOICES: usize = 3;
/// Room in each delay line, seconds.
const MAX_DELAY: f32 = 0.1;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusConfig {
    pub rate: f32,
    pub depth: f32,
    pub delay: f32,
    pub mix: f32,
}

impl ChorusConfig {
    pub fn clamped(self) -> Self {
        Self {
            rate: bounded(self.rate, 0.0, MAX_RATE),
            depth: bounded(self.depth, 0.0, 20.0),
            delay: bounded(self.delay, 1.0, 50.0),
            mix: bounded(self.mix, 0.0, 1.0),
        }
    }
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            rate: 1.5,
            depth: 2.0,
            delay: 15.0,
            mix: 0.3,
        }
    }
}

struct ChorusNodes {
    dry_wet: DryWet,
    sum: NodeId,
    delays: [NodeId; VOICES],
    modulators: [Modulator; VOICES],
}

pub struct Chorus {
    config: ChorusConfig,
    nodes: Option<ChorusNodes>,
}

impl Chorus {
    pub fn new(config: ChorusConfig) -> Self {
        Self {
            config: config.clamped(),
            nodes: None,
        }
    }

    pub fn settings(&self) -> &ChorusConfig {
        &self.config
    }

    fn apply(&self, graph: &mut Graph) -> Result<()> {
        let Some(nodes) = &self.nodes else {
            return Ok(());
        };
        nodes.dry_wet.set_mix(graph, self.config.mix)?;
        for (delay, modulator) in nodes.delays.iter().zip(&nodes.modulators) {
            graph.set_param(delay.param(ParamKind::DelayTime), self.config.delay / 1000.0)?;
            modulator.set_rate(graph, self.config.rate)?;
            modulator.set_depth(graph, self.config.depth / 1000.0)?;
        }
        Ok(())
    }
}

impl Default for Chorus {
    fn default() -> Self {
        Self::new(ChorusConfig::default())
    }
}

impl EffectUnit for Chorus {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.nodes.is_some() {
            return Err(already_initialized("chorus"));
        }
        let config = self.config;
        let dry_wet = DryWet::build(graph, config.mix)?;
        let sum = graph.add_gain(1.0 / VOICES as f32);
        graph.connect(sum, dry_wet.wet)?;

        let mut delays = Vec::with_capacity(VOICES);
        let mut modulators = Vec::with_capacity(VOICES);
        for voice in 0..VOICES {
            let delay = graph.add_delay(MAX_DELAY, config.delay / 1000.0, 0.0);
            graph.connect(dry_wet.input, delay)?;
            graph.connect(delay, sum)?;

            let phase = voice as f32 / VOICES as f32;
            let modulator =
                Modulator::build(graph, Waveform::Sine, config.rate, config.depth / 1000.0, phase)?;
            modulator.modulate(graph, delay, ParamKind::DelayTime)?;

            delays.push(delay);
            modulators.push(modulator);
        }

        let ports = dry_wet.ports();
        self.nodes = Some(ChorusNodes {
            dry_wet,
            sum,
            delays: [delays[0], delays[1], delays[2]],
            modulators: [modulators[0], modulators[1], modulators[2]],
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
        EffectConfig::Chorus(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "rate" => self.config.rate = value.as_number(name)?,
            "depth" => self.config.depth = value.as_number(name)?,
            "delay" => self.config.delay = value.as_number(name)?,
            "mix" => self.config.mix = mix_value(value)?,
            _ => return Err(Error::unknown_param("chorus", name)),
        }
        self.config = self.config.clamped();
        self.apply(graph)
    }

    fn teardown(&mut self, graph: &mut Graph) {
        if let Some(nodes) = self.nodes.take() {
            remove_nodes(graph, nodes.dry_wet.nodes());
            remove_nodes(graph, nodes.modulators.iter().flat_map(Modulator::nodes));
            remove_nodes(graph, nodes.delays);
            remove_nodes(graph, [nodes.sum]);
        }
    }
}
