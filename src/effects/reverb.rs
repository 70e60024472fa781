//! Convolution reverb over a generated impulse response.
//!
//! Changing `duration` or `decay` regenerates the response and swaps it into
//! the live convolver; the tail currently ringing is cut off.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::reverb::{impulse_response, MAX_IMPULSE_SECONDS},
    effects::unit::{
        already_initialized, bounded, mix_value, remove_nodes, DryWet, EffectConfig, EffectPorts,
        EffectUnit,
    },
    graph::{Graph, NodeId},
    synth::config::ParamValue,
    Error, Result,
};

const IMPULSE_SEED: u64 = 0x5EED_0F_2E7E;
const MIN_DURATION: f32 = 0.01;
const MAX_DECAY: f32 = 100.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbConfig {
    /// Tail length, seconds.
    pub duration: f32,
    pub decay: f32,
    pub mix: f32,
}

impl ReverbConfig {
    pub fn clamped(self) -> Self {
        Self {
            duration: bounded(self.duration, MIN_DURATION, MAX_IMPULSE_SECONDS),
            decay: bounded(self.decay, 0.0, MAX_DECAY),
            mix: bounded(self.mix, 0.0, 1.0),
        }
    }
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            duration: 2.0,
            decay: 3.0,
            mix: 0.25,
        }
    }
}

struct ReverbNodes {
    dry_wet: DryWet,
    convolver: NodeId,
}

pub struct Reverb {
    config: ReverbConfig,
    nodes: Option<ReverbNodes>,
}

impl Reverb {
    pub fn new(config: ReverbConfig) -> Self {
        Self {
            config: config.clamped(),
            nodes: None,
        }
    }

    pub fn settings(&self) -> &ReverbConfig {
        &self.config
    }

    fn impulse(&self, sample_rate: f32) -> Vec<f32> {
        impulse_response(sample_rate, self.config.duration, self.config.decay, IMPULSE_SEED)
    }

    fn regenerate(&self, graph: &mut Graph) -> Result<()> {
        let Some(nodes) = &self.nodes else {
            return Ok(());
        };
        let impulse = self.impulse(graph.sample_rate());
        graph.set_impulse(nodes.convolver, &impulse)
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new(ReverbConfig::default())
    }
}

impl EffectUnit for Reverb {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.nodes.is_some() {
            return Err(already_initialized("reverb"));
        }
        let dry_wet = DryWet::build(graph, self.config.mix)?;
        let impulse = self.impulse(graph.sample_rate());
        let convolver = graph.add_convolver(&impulse);
        graph.connect(dry_wet.input, convolver)?;
        graph.connect(convolver, dry_wet.wet)?;

        let ports = dry_wet.ports();
        self.nodes = Some(ReverbNodes { dry_wet, convolver });
        Ok(ports)
    }

    fn input(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.input)
    }

    fn output(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.output)
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Reverb(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "duration" => {
                self.config.duration = value.as_number(name)?;
                self.config = self.config.clamped();
                self.regenerate(graph)
            }
            "decay" => {
                self.config.decay = value.as_number(name)?;
                self.config = self.config.clamped();
                self.regenerate(graph)
            }
            "mix" => {
                self.config.mix = mix_value(value)?;
                match &self.nodes {
                    Some(nodes) => nodes.dry_wet.set_mix(graph, self.config.mix),
                    None => Ok(()),
                }
            }
            _ => Err(Error::unknown_param("reverb", name)),
        }
    }

    fn teardown(&mut self, graph: &mut Graph) {
        if let Some(nodes) = self.nodes.take() {
            remove_nodes(graph, nodes.dry_wet.nodes());
            remove_nodes(graph, [nodes.convolver]);
        }
    }
}
