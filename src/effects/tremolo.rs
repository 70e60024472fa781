//! Tremolo: amplitude modulation.
//!
//! The wet path runs through a gain whose resting value is `1 - depth / 2`;
//! an LFO scaled by `depth / 2` is added on top, so the gain swings between
//! `1 - depth` and `1`.

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

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TremoloConfig {
    pub rate: f32,
    /// 0.0 (none) to 1.0 (full cut at the trough).
    pub depth: f32,
    pub waveform: Waveform,
    pub mix: f32,
}

impl TremoloConfig {
    pub fn clamped(self) -> Self {
        Self {
            rate: bounded(self.rate, 0.0, MAX_RATE),
            depth: bounded(self.depth, 0.0, 1.0),
            mix: bounded(self.mix, 0.0, 1.0),
            ..self
        }
    }
}

impl Default for TremoloConfig {
    fn default() -> Self {
        Self {
            rate: 5.0,
            depth: 0.5,
            waveform: Waveform::Sine,
            mix: 0.0,
        }
    }
}

struct TremoloNodes {
    dry_wet: DryWet,
    vca: NodeId,
    modulator: Modulator,
}

pub struct Tremolo {
    config: TremoloConfig,
    nodes: Option<TremoloNodes>,
}

impl Tremolo {
    pub fn new(config: TremoloConfig) -> Self {
        Self {
            config: config.clamped(),
            nodes: None,
        }
    }

    pub fn settings(&self) -> &TremoloConfig {
        &self.config
    }

    fn apply(&self, graph: &mut Graph) -> Result<()> {
        let Some(nodes) = &self.nodes else {
            return Ok(());
        };
        let half = self.config.depth / 2.0;
        nodes.dry_wet.set_mix(graph, self.config.mix)?;
        graph.set_param(nodes.vca.param(ParamKind::Gain), 1.0 - half)?;
        graph.set_waveform(nodes.modulator.oscillator, self.config.waveform)?;
        nodes.modulator.set_rate(graph, self.config.rate)?;
        nodes.modulator.set_depth(graph, half)
    }
}

impl Default for Tremolo {
    fn default() -> Self {
        Self::new(TremoloConfig::default())
    }
}

impl EffectUnit for Tremolo {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.nodes.is_some() {
            return Err(already_initialized("tremolo"));
        }
        let config = self.config;
        let half = config.depth / 2.0;
        let dry_wet = DryWet::build(graph, config.mix)?;
        let vca = graph.add_gain(1.0 - half);
        graph.connect(dry_wet.input, vca)?;
        graph.connect(vca, dry_wet.wet)?;

        let modulator = Modulator::build(graph, config.waveform, config.rate, half, 0.0)?;
        modulator.modulate(graph, vca, ParamKind::Gain)?;

        let ports = dry_wet.ports();
        self.nodes = Some(TremoloNodes {
            dry_wet,
            vca,
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
        EffectConfig::Tremolo(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "rate" => self.config.rate = value.as_number(name)?,
            "depth" => self.config.depth = value.as_number(name)?,
            "waveform" => self.config.waveform = value.parse(name)?,
            "mix" => self.config.mix = mix_value(value)?,
            _ => return Err(Error::unknown_param("tremolo", name)),
        }
        self.config = self.config.clamped();
        self.apply(graph)
    }

    fn teardown(&mut self, graph: &mut Graph) {
        if let Some(nodes) = self.nodes.take() {
            remove_nodes(graph, nodes.dry_wet.nodes());
            remove_nodes(graph, nodes.modulator.nodes());
            remove_nodes(graph, [nodes.vca]);
        }
    }
}
